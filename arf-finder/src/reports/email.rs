//! Email relationship report

use crate::engine::{filled, FieldPlan, Report, ReportField};
use crate::source::{AssetSource, JourneyCriteria, SendDefinitionCriteria, SourceError};
use arf_common::models::{Email, EmailSendDefinition, Journey, TriggeredSendDefinition};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmailField {
    JourneysUsing,
    InitiatedEmailsUsing,
    TriggeredSends,
}

impl ReportField for EmailField {
    const ALL: &'static [Self] = &[
        Self::JourneysUsing,
        Self::InitiatedEmailsUsing,
        Self::TriggeredSends,
    ];

    fn key(self) -> &'static str {
        match self {
            Self::JourneysUsing => "journeysUsingEmail",
            Self::InitiatedEmailsUsing => "initiatedEmailsUsing",
            Self::TriggeredSends => "triggeredSends",
        }
    }
}

pub enum EmailValue {
    JourneysUsing(Vec<Journey>),
    InitiatedEmailsUsing(Vec<EmailSendDefinition>),
    TriggeredSends(Vec<TriggeredSendDefinition>),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EmailReport {
    #[serde(rename = "journeysUsingEmail")]
    pub journeys_using: Vec<Journey>,
    #[serde(rename = "initiatedEmailsUsing")]
    pub initiated_emails_using: Vec<EmailSendDefinition>,
    #[serde(rename = "triggeredSends")]
    pub triggered_sends: Vec<TriggeredSendDefinition>,
}

impl Report for EmailReport {
    type Field = EmailField;
    type Value = EmailValue;
    const KIND: &'static str = "email";

    fn value(&self, field: EmailField) -> Option<EmailValue> {
        match field {
            EmailField::JourneysUsing => filled(&self.journeys_using).map(EmailValue::JourneysUsing),
            EmailField::InitiatedEmailsUsing => {
                filled(&self.initiated_emails_using).map(EmailValue::InitiatedEmailsUsing)
            }
            EmailField::TriggeredSends => {
                filled(&self.triggered_sends).map(EmailValue::TriggeredSends)
            }
        }
    }

    fn is_filled(&self, field: EmailField) -> bool {
        match field {
            EmailField::JourneysUsing => !self.journeys_using.is_empty(),
            EmailField::InitiatedEmailsUsing => !self.initiated_emails_using.is_empty(),
            EmailField::TriggeredSends => !self.triggered_sends.is_empty(),
        }
    }

    fn set(&mut self, value: EmailValue) {
        match value {
            EmailValue::JourneysUsing(v) => self.journeys_using = v,
            EmailValue::InitiatedEmailsUsing(v) => self.initiated_emails_using = v,
            EmailValue::TriggeredSends(v) => self.triggered_sends = v,
        }
    }

    fn field_of(value: &EmailValue) -> EmailField {
        match value {
            EmailValue::JourneysUsing(_) => EmailField::JourneysUsing,
            EmailValue::InitiatedEmailsUsing(_) => EmailField::InitiatedEmailsUsing,
            EmailValue::TriggeredSends(_) => EmailField::TriggeredSends,
        }
    }
}

/// Fetch table for one resolved email
pub struct EmailPlan {
    source: Arc<dyn AssetSource>,
    root: Email,
}

impl EmailPlan {
    pub fn new(source: Arc<dyn AssetSource>, root: Email) -> Self {
        Self { source, root }
    }
}

#[async_trait]
impl FieldPlan<EmailReport> for EmailPlan {
    async fn fetch(
        &self,
        field: EmailField,
        cancel: CancellationToken,
    ) -> Result<EmailValue, SourceError> {
        let id = self.root.id.clone();
        Ok(match field {
            EmailField::JourneysUsing => EmailValue::JourneysUsing(
                self.source
                    .journeys(&JourneyCriteria::SendsEmail(id), &cancel)
                    .await?,
            ),
            EmailField::InitiatedEmailsUsing => EmailValue::InitiatedEmailsUsing(
                self.source
                    .send_definitions(&SendDefinitionCriteria::Email(id))
                    .await?,
            ),
            EmailField::TriggeredSends => {
                EmailValue::TriggeredSends(self.source.triggered_sends(&id).await?)
            }
        })
    }
}
