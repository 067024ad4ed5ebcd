//! Marketing asset models
//!
//! These are the entities the data-source adapters return and the report
//! fields carry. JSON field names follow the public response format consumed
//! by the browser front end, which is why most of them are PascalCase.

use serde::{Deserialize, Serialize};

/// Data folder in the folder tree (used to build data extension paths)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "ParentID")]
    pub parent_id: String,
    #[serde(rename = "ParentName")]
    pub parent_name: String,
}

/// A data extension (the root entity of the data extension report)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataExtension {
    #[serde(rename = "CustomerKey")]
    pub customer_key: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "CategoryID")]
    pub category_id: String,
    #[serde(rename = "ObjectID")]
    pub object_id: String,
}

/// SQL query activity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryDefinition {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "ObjectID")]
    pub object_id: String,
}

/// Import activity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportDefinition {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "ObjectID")]
    pub object_id: String,
}

/// Filter activity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterActivity {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "ObjectID")]
    pub object_id: String,
}

/// Content builder email; `id` is the legacy numeric id as a string
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "ID")]
    pub id: String,
}

/// Cloud page (landing page)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudPage {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "HTML", default)]
    pub html: String,
}

/// User-initiated email send definition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailSendDefinition {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "ObjectID")]
    pub object_id: String,
    #[serde(rename = "CustomObjectID")]
    pub custom_object_id: String,
    #[serde(rename = "EmailID")]
    pub email_id: String,
}

/// Server-side JavaScript activity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "ssjsActivityId")]
    pub object_id: String,
}

/// Journey (interaction)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Journey {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "ID")]
    pub id: String,
    /// Entry event key derived from the journey defaults; internal only
    #[serde(skip)]
    pub event_definition_key: String,
}

/// Automation (program)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Automation {
    #[serde(rename = "ObjectID")]
    pub object_id: String,
    #[serde(rename = "Name")]
    pub name: String,
}

/// Automation step activity linking a definition to its program
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "ProgramObjectID")]
    pub program_object_id: String,
}

/// Triggered send definition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggeredSendDefinition {
    #[serde(rename = "Name")]
    pub name: String,
}
