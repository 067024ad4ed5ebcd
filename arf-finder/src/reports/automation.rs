//! Automation lookup for a single activity definition
//!
//! Unlike the other reports this one is a strict chain (definition, then the
//! automation steps running it, then their automation) so it does not go
//! through the fan-out engine.

use crate::source::{
    AssetSource, FilterCriteria, ImportCriteria, QueryCriteria, ScriptCriteria, SourceError,
};
use arf_common::models::Automation;
use serde::Serialize;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum AutomationLookupError {
    #[error("Unsupported activity type: {0}")]
    UnsupportedType(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Activity definition kinds an automation step can run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityType {
    Query,
    Import,
    Script,
    Filter,
}

impl FromStr for ActivityType {
    type Err = AutomationLookupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Queries" => Ok(ActivityType::Query),
            "Import Activities" => Ok(ActivityType::Import),
            "Scripts" => Ok(ActivityType::Script),
            "Filter Activities" => Ok(ActivityType::Filter),
            other => Err(AutomationLookupError::UnsupportedType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AutomationReport {
    pub automations: Vec<Automation>,
}

/// Object id of the first definition of `activity_type` named `name`
async fn definition_object_id(
    source: &dyn AssetSource,
    activity_type: ActivityType,
    name: &str,
) -> Result<Option<String>, SourceError> {
    let name = name.to_string();
    let id = match activity_type {
        ActivityType::Query => source
            .queries(&QueryCriteria::Name(name))
            .await?
            .into_iter()
            .next()
            .map(|q| q.object_id),
        ActivityType::Import => source
            .imports(&ImportCriteria::Name(name))
            .await?
            .into_iter()
            .next()
            .map(|i| i.object_id),
        ActivityType::Script => source
            .scripts(&ScriptCriteria::Name(name))
            .await?
            .into_iter()
            .next()
            .map(|s| s.object_id),
        ActivityType::Filter => source
            .filters(&FilterCriteria::Name(name))
            .await?
            .into_iter()
            .next()
            .map(|f| f.object_id),
    };
    Ok(id.filter(|id| !id.is_empty()))
}

/// Automations running the named activity definition
pub async fn find_automations(
    source: &dyn AssetSource,
    activity_type: ActivityType,
    name: &str,
) -> Result<AutomationReport, AutomationLookupError> {
    let definition_id = definition_object_id(source, activity_type, name)
        .await?
        .ok_or_else(|| {
            AutomationLookupError::NotFound("No activity found with the provided name".to_string())
        })?;
    debug!(?activity_type, definition_id = %definition_id, "Resolved activity definition");

    let activities = source.activities(&definition_id).await?;
    let program_id = activities
        .into_iter()
        .next()
        .map(|a| a.program_object_id)
        .ok_or_else(|| {
            AutomationLookupError::NotFound("No automations found for this activity".to_string())
        })?;

    let automations = source.automations(&program_id).await?;
    info!(count = automations.len(), "Found automations for activity");

    Ok(AutomationReport { automations })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_types_parse_from_display_names() {
        assert_eq!("Queries".parse::<ActivityType>().unwrap(), ActivityType::Query);
        assert_eq!(
            "Import Activities".parse::<ActivityType>().unwrap(),
            ActivityType::Import
        );
        assert_eq!("Scripts".parse::<ActivityType>().unwrap(), ActivityType::Script);
        assert_eq!(
            "Filter Activities".parse::<ActivityType>().unwrap(),
            ActivityType::Filter
        );
        assert!(matches!(
            "Emails".parse::<ActivityType>(),
            Err(AutomationLookupError::UnsupportedType(_))
        ));
    }
}
