//! Data-source seam between the aggregation layer and the platform APIs
//!
//! [`AssetSource`] has one method per entity kind. Each takes typed lookup
//! criteria and returns the matching entities; how the criteria become SOAP
//! filters or REST queries is the adapter's business.

use crate::auth::CredentialError;
use crate::sfmc::soap::SoapError;
use arf_common::models::{
    Activity, Automation, CloudPage, DataExtension, Email, EmailSendDefinition, FilterActivity,
    ImportDefinition, Journey, QueryDefinition, Script, TriggeredSendDefinition,
};
use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Data-source errors
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    /// Upstream rejected the bearer token
    #[error("Upstream rejected credentials (status {0})")]
    Unauthorized(u16),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Upstream returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("SOAP error: {0}")]
    Soap(#[from] SoapError),

    #[error("Unexpected response: {0}")]
    Parse(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Cancelled")]
    Cancelled,
}

impl SourceError {
    /// Errors that make every other fetch in the same request pointless
    pub fn is_fatal(&self) -> bool {
        matches!(self, SourceError::Credential(_) | SourceError::Unauthorized(_))
    }
}

pub type SourceResult<T> = Result<T, SourceError>;

/// How a data extension is identified by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataExtensionLookup {
    Name(String),
    CustomerKey(String),
}

impl DataExtensionLookup {
    pub fn property(&self) -> &'static str {
        match self {
            DataExtensionLookup::Name(_) => "Name",
            DataExtensionLookup::CustomerKey(_) => "CustomerKey",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            DataExtensionLookup::Name(v) | DataExtensionLookup::CustomerKey(v) => v,
        }
    }
}

/// Visibility scope a lookup runs in
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// The authenticated business unit only
    Private,
    /// Objects shared across all business units of an enterprise
    Shared { enterprise_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryCriteria {
    /// Queries writing into the named data extension
    TargetName(String),
    /// Queries whose SQL mentions the text
    TextContains(String),
    Name(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportCriteria {
    DestinationObjectId(String),
    Name(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterCriteria {
    DestinationObjectId(String),
    Name(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailCriteria {
    /// Emails whose content mentions a data extension name
    ContentMentions(String),
    /// Emails whose content references a cloud page id
    ReferencesCloudPage(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailLookup {
    LegacyId(String),
    Name(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendDefinitionCriteria {
    /// Sends whose audience list is the data extension with this object id
    DataExtension(String),
    /// Sends of the email with this legacy id
    Email(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JourneyCriteria {
    /// Journeys whose entry event reads from the named data extension
    EntrySource(String),
    /// Journeys with an email activity sending this legacy email id
    SendsEmail(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptCriteria {
    /// Scripts whose body mentions the name or the customer key
    References { name: String, customer_key: String },
    Name(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloudPageCriteria {
    /// Pages whose content mentions the name or the customer key
    References { name: String, customer_key: String },
    /// Pages whose content references another cloud page id
    ReferencesCloudPage(String),
}

/// Per-entity-kind fetch operations against the platform
#[async_trait]
pub trait AssetSource: Send + Sync {
    async fn data_extensions(
        &self,
        lookup: &DataExtensionLookup,
        scope: &Scope,
    ) -> SourceResult<Vec<DataExtension>>;

    /// Folder path of a data extension category, e.g. `Data Extensions > A > B`
    async fn folder_path(&self, category_id: &str, shared: bool) -> SourceResult<String>;

    async fn queries(&self, criteria: &QueryCriteria) -> SourceResult<Vec<QueryDefinition>>;

    async fn imports(&self, criteria: &ImportCriteria) -> SourceResult<Vec<ImportDefinition>>;

    async fn filters(&self, criteria: &FilterCriteria) -> SourceResult<Vec<FilterActivity>>;

    async fn emails(&self, criteria: &EmailCriteria) -> SourceResult<Vec<Email>>;

    /// Single email by legacy id or name; `None` when nothing matches
    async fn email(&self, lookup: &EmailLookup) -> SourceResult<Option<Email>>;

    async fn send_definitions(
        &self,
        criteria: &SendDefinitionCriteria,
    ) -> SourceResult<Vec<EmailSendDefinition>>;

    async fn triggered_sends(&self, email_id: &str) -> SourceResult<Vec<TriggeredSendDefinition>>;

    /// Journey matching fans out internally, so it observes cancellation
    async fn journeys(
        &self,
        criteria: &JourneyCriteria,
        cancel: &CancellationToken,
    ) -> SourceResult<Vec<Journey>>;

    async fn scripts(&self, criteria: &ScriptCriteria) -> SourceResult<Vec<Script>>;

    async fn cloud_pages(&self, criteria: &CloudPageCriteria) -> SourceResult<Vec<CloudPage>>;

    /// Automation steps running the definition with this object id
    async fn activities(&self, definition_object_id: &str) -> SourceResult<Vec<Activity>>;

    async fn automations(&self, program_object_id: &str) -> SourceResult<Vec<Automation>>;
}
