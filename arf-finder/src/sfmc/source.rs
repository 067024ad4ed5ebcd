//! [`AssetSource`] backed by the marketing platform SOAP and REST APIs

use super::client::SfmcClient;
use super::matching::{
    combined_content, extract_event_key, id_string, is_generated_filter, is_generated_import,
    is_generated_send_definition, is_generated_triggered_send, mentions_any, parse_created_date,
    sanitize_journey_name,
};
use super::rest::{fetch_all_pages, PageResponse};
use super::soap::{Record, RetrieveRequest, SoapFilter};
use crate::source::{
    AssetSource, CloudPageCriteria, DataExtensionLookup, EmailCriteria, EmailLookup,
    FilterCriteria, ImportCriteria, JourneyCriteria, QueryCriteria, Scope, ScriptCriteria,
    SendDefinitionCriteria, SourceError, SourceResult,
};
use arf_common::models::{
    Activity, Automation, CloudPage, DataExtension, Email, EmailSendDefinition, FilterActivity,
    Folder, ImportDefinition, Journey, QueryDefinition, Script, TriggeredSendDefinition,
};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const ASSET_QUERY_PATH: &str = "/asset/v1/content/assets/query";
const JOURNEYS_PATH: &str = "/interaction/v1/interactions";
const SCRIPTS_PATH: &str = "/automation/v1/scripts";

const ROOT_FOLDERS: [&str; 2] = ["Data Extensions", "Shared Data Extensions"];
const MAX_FOLDER_DEPTH: usize = 64;

/// Adapter translating lookup criteria into platform API calls
pub struct SfmcSource {
    client: SfmcClient,
}

impl SfmcSource {
    pub fn new(client: SfmcClient) -> Self {
        Self { client }
    }

    async fn folder(&self, id: &str, shared: bool) -> SourceResult<Folder> {
        let by_id = SoapFilter::equals("ID", id);
        let mut request = RetrieveRequest::new(
            "DataFolder",
            &["ID", "Name", "ParentFolder.ID", "ParentFolder.Name"],
        );
        request = if shared {
            request
                .all_accounts()
                .filter(SoapFilter::equals("ContentType", "shared_dataextension").and(by_id))
        } else {
            request.filter(by_id)
        };

        let record = self
            .client
            .retrieve(&request)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::NotFound(format!("folder with ID {}", id)))?;

        Ok(Folder {
            id: record.get("ID").to_string(),
            name: record.get("Name").to_string(),
            parent_id: record.get("ParentFolder.ID").to_string(),
            parent_name: record.get("ParentFolder.Name").to_string(),
        })
    }

    /// Every item of a paged GET listing
    async fn list_pages(&self, path: &str, extras: &str) -> SourceResult<Vec<Value>> {
        let limits = self.client.limits();
        fetch_all_pages(limits.page_size, limits.max_in_flight, |page| {
            let url = format!(
                "{}?$page={}&$pageSize={}{}",
                path, page, limits.page_size, extras
            );
            async move { into_page(self.client.rest_get(&url).await?) }
        })
        .await
    }

    /// Every item matching an asset query
    async fn query_assets(&self, query: &Value, fields: &[&str]) -> SourceResult<Vec<Value>> {
        let limits = self.client.limits();
        fetch_all_pages(limits.page_size, limits.max_in_flight, |page| {
            let body = json!({
                "page": { "page": page, "pageSize": limits.page_size },
                "query": query,
                "sort": [{ "property": "id", "direction": "ASC" }],
                "fields": fields,
            });
            async move { into_page(self.client.rest_post(ASSET_QUERY_PATH, &body).await?) }
        })
        .await
    }

    /// Event definition behind a journey, by key first and then by name
    async fn event_definition(&self, journey: &Journey) -> SourceResult<Option<EventDefinition>> {
        if !journey.event_definition_key.is_empty() {
            let path = format!(
                "/interaction/v1/eventDefinitions/key:{}",
                urlencoding::encode(&journey.event_definition_key)
            );
            match self.client.rest_get(&path).await {
                Ok(value) => {
                    return serde_json::from_value(value)
                        .map(Some)
                        .map_err(|e| SourceError::Parse(e.to_string()))
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => debug!(
                    key = %journey.event_definition_key,
                    error = %e,
                    "Event definition lookup by key failed, trying journey name"
                ),
            }
        }

        let path = format!(
            "/interaction/v1/eventDefinitions?name={}",
            urlencoding::encode(sanitize_journey_name(&journey.name))
        );
        let page = into_page(self.client.rest_get(&path).await?)?;
        let newest = page
            .items
            .into_iter()
            .filter_map(|item| serde_json::from_value::<EventDefinition>(item).ok())
            .max_by_key(|def| parse_created_date(&def.created_date));
        Ok(newest)
    }

    async fn journeys_by_entry_source(&self, de_name: &str) -> SourceResult<Vec<Journey>> {
        let journeys: Vec<Journey> = self
            .list_pages(JOURNEYS_PATH, "")
            .await?
            .iter()
            .map(journey_from_item)
            .collect();
        info!(count = journeys.len(), "Matching journeys against entry sources");

        let limits = self.client.limits();
        let checks: Vec<(Journey, SourceResult<Option<EventDefinition>>)> =
            stream::iter(journeys.into_iter().enumerate())
                .then(|(i, journey)| async move {
                    if limits.cooldown_every > 0 && i > 0 && i % limits.cooldown_every == 0 {
                        debug!(started = i, "Cooling down journey fan-out");
                        tokio::time::sleep(limits.cooldown).await;
                    }
                    journey
                })
                .map(|journey| async move {
                    let definition = self.event_definition(&journey).await;
                    (journey, definition)
                })
                .buffered(limits.max_in_flight.max(1))
                .collect()
                .await;

        let mut matched = Vec::new();
        for (journey, definition) in checks {
            match definition {
                Ok(Some(def)) if def.data_extension_name == de_name => matched.push(journey),
                Ok(_) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!(journey = %journey.name, error = %e, "Skipping journey"),
            }
        }
        Ok(matched)
    }

    async fn journeys_sending_email(&self, email_id: &str) -> SourceResult<Vec<Journey>> {
        let items = self.list_pages(JOURNEYS_PATH, "&extras=activities").await?;
        Ok(items
            .iter()
            .filter(|item| sends_email(item, email_id))
            .map(journey_from_item)
            .collect())
    }

    async fn scripts_by_name(&self, name: &str) -> SourceResult<Vec<Script>> {
        let path = format!(
            "{}?$filter=name%20eq%20{}",
            SCRIPTS_PATH,
            urlencoding::encode(name)
        );
        let page = into_page(self.client.rest_get(&path).await?)?;
        Ok(page.items.iter().map(script_from_item).collect())
    }
}

#[derive(Debug, Default, Deserialize)]
struct EventDefinition {
    #[serde(rename = "dataExtensionName", default)]
    data_extension_name: String,
    #[serde(rename = "createdDate", default)]
    created_date: String,
}

fn into_page(value: Value) -> SourceResult<PageResponse> {
    serde_json::from_value(value).map_err(|e| SourceError::Parse(e.to_string()))
}

fn text(item: &Value, key: &str) -> String {
    item.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn journey_from_item(item: &Value) -> Journey {
    Journey {
        name: text(item, "name"),
        id: item.get("id").and_then(id_string).unwrap_or_default(),
        event_definition_key: item
            .pointer("/defaults/email/0")
            .and_then(Value::as_str)
            .and_then(extract_event_key)
            .unwrap_or_default(),
    }
}

fn script_from_item(item: &Value) -> Script {
    Script {
        name: text(item, "name"),
        object_id: item
            .get("ssjsActivityId")
            .and_then(id_string)
            .unwrap_or_default(),
    }
}

/// True when any `EMAILV2` activity of the journey sends `email_id`
fn sends_email(journey: &Value, email_id: &str) -> bool {
    let Some(activities) = journey.get("activities").and_then(Value::as_array) else {
        return false;
    };
    activities.iter().any(|activity| {
        activity.get("type").and_then(Value::as_str) == Some("EMAILV2")
            && activity
                .pointer("/configurationArguments/triggeredSend/emailId")
                .and_then(id_string)
                .is_some_and(|id| id == email_id)
    })
}

fn email_asset_types() -> Value {
    json!({
        "leftOperand": { "property": "assetType.name", "simpleOperator": "equal", "value": "templatebasedemail" },
        "logicalOperator": "OR",
        "rightOperand": { "property": "assetType.name", "simpleOperator": "equal", "value": "htmlemail" },
    })
}

fn name_and_object_id(record: &Record) -> (String, String) {
    (
        record.get("Name").to_string(),
        record.get("ObjectID").to_string(),
    )
}

#[async_trait]
impl AssetSource for SfmcSource {
    async fn data_extensions(
        &self,
        lookup: &DataExtensionLookup,
        scope: &Scope,
    ) -> SourceResult<Vec<DataExtension>> {
        let by_lookup = SoapFilter::equals(lookup.property(), lookup.value());
        let request = RetrieveRequest::new(
            "DataExtension",
            &["Name", "CustomerKey", "CategoryID", "ObjectID"],
        );
        let request = match scope {
            Scope::Private => request.filter(by_lookup),
            Scope::Shared { enterprise_id } => request
                .all_accounts()
                .filter(SoapFilter::equals("Client.ID", enterprise_id.as_str()).and(by_lookup)),
        };

        Ok(self
            .client
            .retrieve(&request)
            .await?
            .iter()
            .map(|r| DataExtension {
                customer_key: r.get("CustomerKey").to_string(),
                name: r.get("Name").to_string(),
                category_id: r.get("CategoryID").to_string(),
                object_id: r.get("ObjectID").to_string(),
            })
            .collect())
    }

    async fn folder_path(&self, category_id: &str, shared: bool) -> SourceResult<String> {
        let mut segments: Vec<String> = Vec::new();
        let mut current = category_id.to_string();

        for _ in 0..MAX_FOLDER_DEPTH {
            let folder = self.folder(&current, shared).await?;
            if ROOT_FOLDERS.contains(&folder.name.as_str()) {
                segments.insert(0, folder.name);
                return Ok(segments.join(" > "));
            }
            segments.insert(0, folder.name);
            if ROOT_FOLDERS.contains(&folder.parent_name.as_str()) {
                segments.insert(0, folder.parent_name);
                return Ok(segments.join(" > "));
            }
            if folder.parent_id.is_empty() {
                return Ok(segments.join(" > "));
            }
            current = folder.parent_id;
        }

        Err(SourceError::Parse(format!(
            "folder hierarchy above {} deeper than {} levels",
            category_id, MAX_FOLDER_DEPTH
        )))
    }

    async fn queries(&self, criteria: &QueryCriteria) -> SourceResult<Vec<QueryDefinition>> {
        let filter = match criteria {
            QueryCriteria::TargetName(name) => {
                SoapFilter::equals("DataExtensionTarget.Name", name.as_str())
            }
            QueryCriteria::TextContains(text) => SoapFilter::like("QueryText", text.as_str()),
            QueryCriteria::Name(name) => SoapFilter::equals("Name", name.as_str()),
        };
        let request = RetrieveRequest::new("QueryDefinition", &["Name", "ObjectID"]).filter(filter);

        Ok(self
            .client
            .retrieve(&request)
            .await?
            .iter()
            .map(|r| {
                let (name, object_id) = name_and_object_id(r);
                QueryDefinition { name, object_id }
            })
            .collect())
    }

    async fn imports(&self, criteria: &ImportCriteria) -> SourceResult<Vec<ImportDefinition>> {
        let filter = match criteria {
            ImportCriteria::DestinationObjectId(id) => {
                SoapFilter::equals("DestinationObject.ObjectID", id.as_str())
            }
            ImportCriteria::Name(name) => SoapFilter::equals("Name", name.as_str()),
        };
        let request =
            RetrieveRequest::new("ImportDefinition", &["Name", "ObjectID"]).filter(filter);

        Ok(self
            .client
            .retrieve(&request)
            .await?
            .iter()
            .map(name_and_object_id)
            .filter(|(name, _)| !is_generated_import(name))
            .map(|(name, object_id)| ImportDefinition { name, object_id })
            .collect())
    }

    async fn filters(&self, criteria: &FilterCriteria) -> SourceResult<Vec<FilterActivity>> {
        let filter = match criteria {
            FilterCriteria::DestinationObjectId(id) => SoapFilter::equals("DestinationTypeID", "2")
                .and(SoapFilter::equals("DestinationObjectID", id.as_str())),
            FilterCriteria::Name(name) => SoapFilter::equals("Name", name.as_str()),
        };
        let request = RetrieveRequest::new("FilterActivity", &["Name", "ObjectID"]).filter(filter);

        Ok(self
            .client
            .retrieve(&request)
            .await?
            .iter()
            .map(name_and_object_id)
            .filter(|(name, _)| !is_generated_filter(name))
            .map(|(name, object_id)| FilterActivity { name, object_id })
            .collect())
    }

    async fn emails(&self, criteria: &EmailCriteria) -> SourceResult<Vec<Email>> {
        match criteria {
            EmailCriteria::ContentMentions(de_name) => {
                let quoted = Value::String(de_name.clone()).to_string();
                let query = json!({
                    "leftOperand": email_asset_types(),
                    "logicalOperator": "AND",
                    "rightOperand": {
                        "property": "content",
                        "simpleOperator": "mustContain",
                        "value": format!("%{}%", quoted),
                    },
                });
                let items = self.query_assets(&query, &["name", "id"]).await?;
                Ok(items
                    .iter()
                    .map(|item| Email {
                        name: text(item, "name"),
                        id: item.get("id").and_then(id_string).unwrap_or_default(),
                    })
                    .collect())
            }
            EmailCriteria::ReferencesCloudPage(page_id) => {
                let items = self
                    .query_assets(&email_asset_types(), &["name", "id", "views"])
                    .await?;
                Ok(items
                    .iter()
                    .filter(|item| item.get("name").and_then(Value::as_str).is_some())
                    .filter(|item| mentions_any(&combined_content(item), &[page_id.as_str()]))
                    .filter_map(|item| {
                        let id = item.get("id").and_then(id_string)?;
                        Some(Email {
                            name: text(item, "name"),
                            id,
                        })
                    })
                    .collect())
            }
        }
    }

    async fn email(&self, lookup: &EmailLookup) -> SourceResult<Option<Email>> {
        let (property, value) = match lookup {
            EmailLookup::LegacyId(id) => ("data.email.legacy.legacyId", id),
            EmailLookup::Name(name) => ("name", name),
        };
        let body = json!({
            "page": { "page": 1, "pageSize": 1 },
            "query": { "property": property, "simpleOperator": "equal", "value": value },
            "fields": ["name", "id"],
        });
        let page = into_page(self.client.rest_post(ASSET_QUERY_PATH, &body).await?)?;

        let Some(item) = page.items.first() else {
            return Ok(None);
        };
        let legacy_id = item
            .pointer("/data/email/legacy/legacyId")
            .and_then(id_string)
            .ok_or_else(|| SourceError::Parse("email asset has no legacy id".to_string()))?;

        Ok(Some(Email {
            name: text(item, "name"),
            id: legacy_id,
        }))
    }

    async fn send_definitions(
        &self,
        criteria: &SendDefinitionCriteria,
    ) -> SourceResult<Vec<EmailSendDefinition>> {
        let request = RetrieveRequest::new(
            "EmailSendDefinition",
            &["Name", "ObjectID", "SendDefinitionList", "Email.ID"],
        );
        let records = self.client.retrieve(&request).await?;
        debug!(count = records.len(), "Retrieved send definitions");

        Ok(records
            .iter()
            .map(|r| EmailSendDefinition {
                name: r.get("Name").to_string(),
                object_id: r.get("ObjectID").to_string(),
                custom_object_id: r.get("SendDefinitionList.CustomObjectID").to_string(),
                email_id: r.get("Email.ID").to_string(),
            })
            .filter(|d| !(d.custom_object_id.is_empty() && d.email_id.is_empty()))
            .filter(|d| !is_generated_send_definition(&d.name))
            .filter(|d| match criteria {
                SendDefinitionCriteria::DataExtension(object_id) => {
                    d.custom_object_id == *object_id
                }
                SendDefinitionCriteria::Email(email_id) => d.email_id == *email_id,
            })
            .collect())
    }

    async fn triggered_sends(&self, email_id: &str) -> SourceResult<Vec<TriggeredSendDefinition>> {
        let request = RetrieveRequest::new("TriggeredSendDefinition", &["Name"]).filter(
            SoapFilter::not_equals("TriggeredSendStatus", "Deleted")
                .and(SoapFilter::equals("Email.ID", email_id)),
        );

        Ok(self
            .client
            .retrieve(&request)
            .await?
            .iter()
            .map(|r| r.get("Name").to_string())
            .filter(|name| !is_generated_triggered_send(name))
            .map(|name| TriggeredSendDefinition { name })
            .collect())
    }

    async fn journeys(
        &self,
        criteria: &JourneyCriteria,
        cancel: &CancellationToken,
    ) -> SourceResult<Vec<Journey>> {
        let work = async {
            match criteria {
                JourneyCriteria::EntrySource(de_name) => {
                    self.journeys_by_entry_source(de_name).await
                }
                JourneyCriteria::SendsEmail(email_id) => {
                    self.journeys_sending_email(email_id).await
                }
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SourceError::Cancelled),
            result = work => result,
        }
    }

    async fn scripts(&self, criteria: &ScriptCriteria) -> SourceResult<Vec<Script>> {
        match criteria {
            ScriptCriteria::Name(name) => self.scripts_by_name(name).await,
            ScriptCriteria::References { name, customer_key } => {
                let items = self.list_pages(SCRIPTS_PATH, "").await?;
                Ok(items
                    .iter()
                    .filter(|item| {
                        item.get("script")
                            .and_then(Value::as_str)
                            .is_some_and(|body| {
                                mentions_any(body, &[name.as_str(), customer_key.as_str()])
                            })
                    })
                    .map(script_from_item)
                    .collect())
            }
        }
    }

    async fn cloud_pages(&self, criteria: &CloudPageCriteria) -> SourceResult<Vec<CloudPage>> {
        let query = json!({
            "leftOperand": { "property": "content", "simpleOperator": "isNotNull" },
            "logicalOperator": "AND",
            "rightOperand": { "property": "assetType.name", "simpleOperator": "equal", "value": "webpage" },
        });
        let items = self.query_assets(&query, &["name", "views"]).await?;

        Ok(items
            .iter()
            .filter(|item| {
                let content = combined_content(item);
                match criteria {
                    CloudPageCriteria::References { name, customer_key } => {
                        mentions_any(&content, &[name.as_str(), customer_key.as_str()])
                    }
                    CloudPageCriteria::ReferencesCloudPage(page_id) => {
                        mentions_any(&content, &[page_id.as_str()])
                    }
                }
            })
            .map(|item| CloudPage {
                name: text(item, "name"),
                html: String::new(),
            })
            .collect())
    }

    async fn activities(&self, definition_object_id: &str) -> SourceResult<Vec<Activity>> {
        let request = RetrieveRequest::new("Activity", &["Name", "Program.ObjectID"])
            .filter(SoapFilter::equals("Definition.ObjectID", definition_object_id));

        Ok(self
            .client
            .retrieve(&request)
            .await?
            .iter()
            .map(|r| Activity {
                name: r.get("Name").to_string(),
                program_object_id: r.get("Program.ObjectID").to_string(),
            })
            .collect())
    }

    async fn automations(&self, program_object_id: &str) -> SourceResult<Vec<Automation>> {
        let request = RetrieveRequest::new("Program", &["Name", "ObjectID"])
            .filter(SoapFilter::equals("ObjectID", program_object_id));

        Ok(self
            .client
            .retrieve(&request)
            .await?
            .iter()
            .map(|r| {
                let (name, object_id) = name_and_object_id(r);
                Automation { object_id, name }
            })
            .collect())
    }
}
