//! Cloud page relationship report

use crate::engine::{filled, FieldPlan, Report, ReportField};
use crate::source::{AssetSource, CloudPageCriteria, EmailCriteria, SourceError};
use arf_common::models::{CloudPage, Email};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloudPageField {
    EmailsUsing,
    CloudPagesUsing,
}

impl ReportField for CloudPageField {
    const ALL: &'static [Self] = &[Self::EmailsUsing, Self::CloudPagesUsing];

    fn key(self) -> &'static str {
        match self {
            Self::EmailsUsing => "emailsUsingCloudPage",
            Self::CloudPagesUsing => "cloudPagesUsingCloudPage",
        }
    }
}

pub enum CloudPageValue {
    EmailsUsing(Vec<Email>),
    CloudPagesUsing(Vec<CloudPage>),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CloudPageReport {
    #[serde(rename = "emailsUsingCloudPage")]
    pub emails_using: Vec<Email>,
    #[serde(rename = "cloudPagesUsingCloudPage")]
    pub cloud_pages_using: Vec<CloudPage>,
}

impl Report for CloudPageReport {
    type Field = CloudPageField;
    type Value = CloudPageValue;
    const KIND: &'static str = "cloud_page";

    fn value(&self, field: CloudPageField) -> Option<CloudPageValue> {
        match field {
            CloudPageField::EmailsUsing => filled(&self.emails_using).map(CloudPageValue::EmailsUsing),
            CloudPageField::CloudPagesUsing => {
                filled(&self.cloud_pages_using).map(CloudPageValue::CloudPagesUsing)
            }
        }
    }

    fn is_filled(&self, field: CloudPageField) -> bool {
        match field {
            CloudPageField::EmailsUsing => !self.emails_using.is_empty(),
            CloudPageField::CloudPagesUsing => !self.cloud_pages_using.is_empty(),
        }
    }

    fn set(&mut self, value: CloudPageValue) {
        match value {
            CloudPageValue::EmailsUsing(v) => self.emails_using = v,
            CloudPageValue::CloudPagesUsing(v) => self.cloud_pages_using = v,
        }
    }

    fn field_of(value: &CloudPageValue) -> CloudPageField {
        match value {
            CloudPageValue::EmailsUsing(_) => CloudPageField::EmailsUsing,
            CloudPageValue::CloudPagesUsing(_) => CloudPageField::CloudPagesUsing,
        }
    }
}

pub struct CloudPagePlan {
    source: Arc<dyn AssetSource>,
    cloud_page_id: String,
}

impl CloudPagePlan {
    pub fn new(source: Arc<dyn AssetSource>, cloud_page_id: impl Into<String>) -> Self {
        Self {
            source,
            cloud_page_id: cloud_page_id.into(),
        }
    }
}

#[async_trait]
impl FieldPlan<CloudPageReport> for CloudPagePlan {
    async fn fetch(
        &self,
        field: CloudPageField,
        _cancel: CancellationToken,
    ) -> Result<CloudPageValue, SourceError> {
        let id = self.cloud_page_id.clone();
        Ok(match field {
            CloudPageField::EmailsUsing => CloudPageValue::EmailsUsing(
                self.source
                    .emails(&EmailCriteria::ReferencesCloudPage(id))
                    .await?,
            ),
            CloudPageField::CloudPagesUsing => CloudPageValue::CloudPagesUsing(
                self.source
                    .cloud_pages(&CloudPageCriteria::ReferencesCloudPage(id))
                    .await?,
            ),
        })
    }
}
