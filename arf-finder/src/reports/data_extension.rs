//! Data extension relationship report

use crate::engine::{filled, FieldPlan, Report, ReportField};
use crate::source::{
    AssetSource, CloudPageCriteria, EmailCriteria, FilterCriteria, ImportCriteria,
    JourneyCriteria, QueryCriteria, ScriptCriteria, SendDefinitionCriteria, SourceError,
};
use arf_common::models::{
    CloudPage, DataExtension, Email, EmailSendDefinition, FilterActivity, ImportDefinition,
    Journey, QueryDefinition, Script,
};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataExtensionField {
    Path,
    QueriesTargeting,
    QueriesIncluding,
    ImportsTargeting,
    FiltersTargeting,
    ContentEmailsIncluding,
    InitiatedEmailsTargeting,
    JourneysUsing,
    ScriptsIncluding,
    PagesIncluding,
}

impl ReportField for DataExtensionField {
    const ALL: &'static [Self] = &[
        Self::Path,
        Self::QueriesTargeting,
        Self::QueriesIncluding,
        Self::ImportsTargeting,
        Self::FiltersTargeting,
        Self::ContentEmailsIncluding,
        Self::InitiatedEmailsTargeting,
        Self::JourneysUsing,
        Self::ScriptsIncluding,
        Self::PagesIncluding,
    ];

    fn key(self) -> &'static str {
        match self {
            Self::Path => "dePath",
            Self::QueriesTargeting => "queriesTargeting",
            Self::QueriesIncluding => "queriesIncluding",
            Self::ImportsTargeting => "importsTargeting",
            Self::FiltersTargeting => "filtersTargeting",
            Self::ContentEmailsIncluding => "contentEmailsIncluding",
            Self::InitiatedEmailsTargeting => "initiatedEmailsTargeting",
            Self::JourneysUsing => "journeysUsingDE",
            Self::ScriptsIncluding => "scriptsIncluding",
            Self::PagesIncluding => "pagesIncluding",
        }
    }
}

pub enum DataExtensionValue {
    Path(String),
    QueriesTargeting(Vec<QueryDefinition>),
    QueriesIncluding(Vec<QueryDefinition>),
    ImportsTargeting(Vec<ImportDefinition>),
    FiltersTargeting(Vec<FilterActivity>),
    ContentEmailsIncluding(Vec<Email>),
    InitiatedEmailsTargeting(Vec<EmailSendDefinition>),
    JourneysUsing(Vec<Journey>),
    ScriptsIncluding(Vec<Script>),
    PagesIncluding(Vec<CloudPage>),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataExtensionReport {
    #[serde(rename = "dePath")]
    pub path: String,
    pub queries_targeting: Vec<QueryDefinition>,
    pub queries_including: Vec<QueryDefinition>,
    pub imports_targeting: Vec<ImportDefinition>,
    pub filters_targeting: Vec<FilterActivity>,
    pub content_emails_including: Vec<Email>,
    pub initiated_emails_targeting: Vec<EmailSendDefinition>,
    #[serde(rename = "journeysUsingDE")]
    pub journeys_using: Vec<Journey>,
    pub scripts_including: Vec<Script>,
    pub pages_including: Vec<CloudPage>,
}

impl Report for DataExtensionReport {
    type Field = DataExtensionField;
    type Value = DataExtensionValue;
    const KIND: &'static str = "data_extension";

    fn value(&self, field: DataExtensionField) -> Option<DataExtensionValue> {
        use DataExtensionField as F;
        use DataExtensionValue as V;
        match field {
            F::Path => (!self.path.is_empty()).then(|| V::Path(self.path.clone())),
            F::QueriesTargeting => filled(&self.queries_targeting).map(V::QueriesTargeting),
            F::QueriesIncluding => filled(&self.queries_including).map(V::QueriesIncluding),
            F::ImportsTargeting => filled(&self.imports_targeting).map(V::ImportsTargeting),
            F::FiltersTargeting => filled(&self.filters_targeting).map(V::FiltersTargeting),
            F::ContentEmailsIncluding => {
                filled(&self.content_emails_including).map(V::ContentEmailsIncluding)
            }
            F::InitiatedEmailsTargeting => {
                filled(&self.initiated_emails_targeting).map(V::InitiatedEmailsTargeting)
            }
            F::JourneysUsing => filled(&self.journeys_using).map(V::JourneysUsing),
            F::ScriptsIncluding => filled(&self.scripts_including).map(V::ScriptsIncluding),
            F::PagesIncluding => filled(&self.pages_including).map(V::PagesIncluding),
        }
    }

    fn is_filled(&self, field: DataExtensionField) -> bool {
        use DataExtensionField as F;
        match field {
            F::Path => !self.path.is_empty(),
            F::QueriesTargeting => !self.queries_targeting.is_empty(),
            F::QueriesIncluding => !self.queries_including.is_empty(),
            F::ImportsTargeting => !self.imports_targeting.is_empty(),
            F::FiltersTargeting => !self.filters_targeting.is_empty(),
            F::ContentEmailsIncluding => !self.content_emails_including.is_empty(),
            F::InitiatedEmailsTargeting => !self.initiated_emails_targeting.is_empty(),
            F::JourneysUsing => !self.journeys_using.is_empty(),
            F::ScriptsIncluding => !self.scripts_including.is_empty(),
            F::PagesIncluding => !self.pages_including.is_empty(),
        }
    }

    fn set(&mut self, value: DataExtensionValue) {
        use DataExtensionValue as V;
        match value {
            V::Path(v) => self.path = v,
            V::QueriesTargeting(v) => self.queries_targeting = v,
            V::QueriesIncluding(v) => self.queries_including = v,
            V::ImportsTargeting(v) => self.imports_targeting = v,
            V::FiltersTargeting(v) => self.filters_targeting = v,
            V::ContentEmailsIncluding(v) => self.content_emails_including = v,
            V::InitiatedEmailsTargeting(v) => self.initiated_emails_targeting = v,
            V::JourneysUsing(v) => self.journeys_using = v,
            V::ScriptsIncluding(v) => self.scripts_including = v,
            V::PagesIncluding(v) => self.pages_including = v,
        }
    }

    fn field_of(value: &DataExtensionValue) -> DataExtensionField {
        use DataExtensionField as F;
        use DataExtensionValue as V;
        match value {
            V::Path(_) => F::Path,
            V::QueriesTargeting(_) => F::QueriesTargeting,
            V::QueriesIncluding(_) => F::QueriesIncluding,
            V::ImportsTargeting(_) => F::ImportsTargeting,
            V::FiltersTargeting(_) => F::FiltersTargeting,
            V::ContentEmailsIncluding(_) => F::ContentEmailsIncluding,
            V::InitiatedEmailsTargeting(_) => F::InitiatedEmailsTargeting,
            V::JourneysUsing(_) => F::JourneysUsing,
            V::ScriptsIncluding(_) => F::ScriptsIncluding,
            V::PagesIncluding(_) => F::PagesIncluding,
        }
    }
}

/// Fetch table for one resolved data extension
pub struct DataExtensionPlan {
    source: Arc<dyn AssetSource>,
    root: DataExtension,
    shared: bool,
}

impl DataExtensionPlan {
    pub fn new(source: Arc<dyn AssetSource>, root: DataExtension, shared: bool) -> Self {
        Self {
            source,
            root,
            shared,
        }
    }
}

#[async_trait]
impl FieldPlan<DataExtensionReport> for DataExtensionPlan {
    async fn fetch(
        &self,
        field: DataExtensionField,
        cancel: CancellationToken,
    ) -> Result<DataExtensionValue, SourceError> {
        use DataExtensionField as F;
        use DataExtensionValue as V;

        let de = &self.root;
        let source = self.source.as_ref();
        Ok(match field {
            F::Path => V::Path(source.folder_path(&de.category_id, self.shared).await?),
            F::QueriesTargeting => V::QueriesTargeting(
                source
                    .queries(&QueryCriteria::TargetName(de.name.clone()))
                    .await?,
            ),
            F::QueriesIncluding => V::QueriesIncluding(
                source
                    .queries(&QueryCriteria::TextContains(de.name.clone()))
                    .await?,
            ),
            F::ImportsTargeting => V::ImportsTargeting(
                source
                    .imports(&ImportCriteria::DestinationObjectId(de.object_id.clone()))
                    .await?,
            ),
            F::FiltersTargeting => V::FiltersTargeting(
                source
                    .filters(&FilterCriteria::DestinationObjectId(de.object_id.clone()))
                    .await?,
            ),
            F::ContentEmailsIncluding => V::ContentEmailsIncluding(
                source
                    .emails(&EmailCriteria::ContentMentions(de.name.clone()))
                    .await?,
            ),
            F::InitiatedEmailsTargeting => V::InitiatedEmailsTargeting(
                source
                    .send_definitions(&SendDefinitionCriteria::DataExtension(de.object_id.clone()))
                    .await?,
            ),
            F::JourneysUsing => V::JourneysUsing(
                source
                    .journeys(&JourneyCriteria::EntrySource(de.name.clone()), &cancel)
                    .await?,
            ),
            F::ScriptsIncluding => V::ScriptsIncluding(
                source
                    .scripts(&ScriptCriteria::References {
                        name: de.name.clone(),
                        customer_key: de.customer_key.clone(),
                    })
                    .await?,
            ),
            F::PagesIncluding => V::PagesIncluding(
                source
                    .cloud_pages(&CloudPageCriteria::References {
                        name: de.name.clone(),
                        customer_key: de.customer_key.clone(),
                    })
                    .await?,
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_serializes_with_wire_names() {
        let report = DataExtensionReport {
            path: "Data Extensions > Sales".to_string(),
            journeys_using: vec![Journey {
                name: "Welcome".to_string(),
                id: "j1".to_string(),
                event_definition_key: String::new(),
            }],
            ..Default::default()
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["dePath"], "Data Extensions > Sales");
        assert_eq!(json["journeysUsingDE"][0]["Name"], "Welcome");
        assert!(json["queriesTargeting"].as_array().unwrap().is_empty());
        assert!(json.get("contentEmailsIncluding").is_some());
    }

    #[test]
    fn every_field_round_trips_through_its_value() {
        let mut report = DataExtensionReport {
            path: "p".to_string(),
            queries_targeting: vec![QueryDefinition::default()],
            queries_including: vec![QueryDefinition::default()],
            imports_targeting: vec![ImportDefinition::default()],
            filters_targeting: vec![FilterActivity::default()],
            content_emails_including: vec![Email::default()],
            initiated_emails_targeting: vec![EmailSendDefinition::default()],
            journeys_using: vec![Journey::default()],
            scripts_including: vec![Script::default()],
            pages_including: vec![CloudPage::default()],
        };
        for &field in DataExtensionField::ALL {
            let value = report.value(field).expect("filled field has a value");
            assert_eq!(DataExtensionReport::field_of(&value), field);
            report.set(value);
            assert!(report.is_filled(field));
        }
        assert!(DataExtensionReport::default()
            .value(DataExtensionField::Path)
            .is_none());
    }
}
