//! Test Helper Utilities
//!
//! In-memory asset source and credential stubs shared by the integration
//! tests.

#![allow(dead_code)]

use arf_common::models::{
    Activity, Automation, CloudPage, DataExtension, Email, EmailSendDefinition, FilterActivity,
    ImportDefinition, Journey, QueryDefinition, Script, TriggeredSendDefinition,
};
use arf_finder::auth::{CredentialError, CredentialProvider, OAuthSettings, TokenCache};
use arf_finder::source::{
    AssetSource, CloudPageCriteria, DataExtensionLookup, EmailCriteria, EmailLookup,
    FilterCriteria, ImportCriteria, JourneyCriteria, QueryCriteria, Scope, ScriptCriteria,
    SendDefinitionCriteria, SourceError, SourceResult,
};
use arf_finder::AppState;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How a mocked operation fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// Upstream rejected the token (aborts a whole aggregation)
    Fatal,
    /// Ordinary upstream failure (field is omitted)
    Transient,
}

/// In-memory [`AssetSource`] with per-operation delays, failures, call
/// counters and a record of calls whose future was dropped mid-flight
#[derive(Default)]
pub struct MockAssetSource {
    pub private_data_extensions: Vec<DataExtension>,
    pub shared_data_extensions: Vec<DataExtension>,
    pub folder_path: String,
    pub queries_targeting: Vec<QueryDefinition>,
    pub queries_including: Vec<QueryDefinition>,
    pub queries: Vec<QueryDefinition>,
    pub imports: Vec<ImportDefinition>,
    pub filters: Vec<FilterActivity>,
    pub content_emails: Vec<Email>,
    pub cloud_page_emails: Vec<Email>,
    pub emails: Vec<Email>,
    pub send_definitions: Vec<EmailSendDefinition>,
    pub triggered_sends: Vec<TriggeredSendDefinition>,
    pub journeys: Vec<Journey>,
    pub scripts: Vec<Script>,
    pub cloud_pages: Vec<CloudPage>,
    pub activities: Vec<Activity>,
    pub automations: Vec<Automation>,

    pub delays: HashMap<&'static str, Duration>,
    pub failures: HashMap<&'static str, Failure>,
    pub calls: Mutex<HashMap<&'static str, usize>>,
    pub abandoned: Mutex<HashSet<&'static str>>,
    pub enterprise_ids: Mutex<Vec<String>>,
}

struct CallGuard<'a> {
    source: &'a MockAssetSource,
    op: &'static str,
    finished: bool,
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.source.abandoned.lock().unwrap().insert(self.op);
        }
    }
}

impl MockAssetSource {
    pub fn delay(mut self, op: &'static str, delay: Duration) -> Self {
        self.delays.insert(op, delay);
        self
    }

    pub fn fail(mut self, op: &'static str, failure: Failure) -> Self {
        self.failures.insert(op, failure);
        self
    }

    /// Number of times `op` was invoked
    pub fn calls(&self, op: &str) -> usize {
        self.calls.lock().unwrap().get(op).copied().unwrap_or(0)
    }

    /// Whether an invocation of `op` was dropped before it finished
    pub fn abandoned(&self, op: &str) -> bool {
        self.abandoned.lock().unwrap().contains(op)
    }

    /// Enterprise ids seen by shared-scope data extension lookups
    pub fn shared_lookups(&self) -> Vec<String> {
        self.enterprise_ids.lock().unwrap().clone()
    }

    async fn enter(&self, op: &'static str) -> SourceResult<()> {
        *self.calls.lock().unwrap().entry(op).or_insert(0) += 1;
        let mut guard = CallGuard {
            source: self,
            op,
            finished: false,
        };

        if let Some(delay) = self.delays.get(op) {
            tokio::time::sleep(*delay).await;
        }
        guard.finished = true;

        match self.failures.get(op) {
            Some(Failure::Fatal) => Err(SourceError::Unauthorized(401)),
            Some(Failure::Transient) => Err(SourceError::Network("connection reset".to_string())),
            None => Ok(()),
        }
    }
}

fn matches_lookup(de: &DataExtension, lookup: &DataExtensionLookup) -> bool {
    match lookup {
        DataExtensionLookup::Name(name) => de.name == *name,
        DataExtensionLookup::CustomerKey(key) => de.customer_key == *key,
    }
}

#[async_trait]
impl AssetSource for MockAssetSource {
    async fn data_extensions(
        &self,
        lookup: &DataExtensionLookup,
        scope: &Scope,
    ) -> SourceResult<Vec<DataExtension>> {
        self.enter("data_extensions").await?;
        let pool = match scope {
            Scope::Private => &self.private_data_extensions,
            Scope::Shared { enterprise_id } => {
                self.enterprise_ids
                    .lock()
                    .unwrap()
                    .push(enterprise_id.clone());
                &self.shared_data_extensions
            }
        };
        Ok(pool
            .iter()
            .filter(|de| matches_lookup(de, lookup))
            .cloned()
            .collect())
    }

    async fn folder_path(&self, _category_id: &str, _shared: bool) -> SourceResult<String> {
        self.enter("folder_path").await?;
        Ok(self.folder_path.clone())
    }

    async fn queries(&self, criteria: &QueryCriteria) -> SourceResult<Vec<QueryDefinition>> {
        self.enter("queries").await?;
        Ok(match criteria {
            QueryCriteria::TargetName(_) => self.queries_targeting.clone(),
            QueryCriteria::TextContains(_) => self.queries_including.clone(),
            QueryCriteria::Name(name) => self
                .queries
                .iter()
                .filter(|q| q.name == *name)
                .cloned()
                .collect(),
        })
    }

    async fn imports(&self, criteria: &ImportCriteria) -> SourceResult<Vec<ImportDefinition>> {
        self.enter("imports").await?;
        Ok(match criteria {
            ImportCriteria::DestinationObjectId(_) => self.imports.clone(),
            ImportCriteria::Name(name) => self
                .imports
                .iter()
                .filter(|i| i.name == *name)
                .cloned()
                .collect(),
        })
    }

    async fn filters(&self, criteria: &FilterCriteria) -> SourceResult<Vec<FilterActivity>> {
        self.enter("filters").await?;
        Ok(match criteria {
            FilterCriteria::DestinationObjectId(_) => self.filters.clone(),
            FilterCriteria::Name(name) => self
                .filters
                .iter()
                .filter(|f| f.name == *name)
                .cloned()
                .collect(),
        })
    }

    async fn emails(&self, criteria: &EmailCriteria) -> SourceResult<Vec<Email>> {
        self.enter("emails").await?;
        Ok(match criteria {
            EmailCriteria::ContentMentions(_) => self.content_emails.clone(),
            EmailCriteria::ReferencesCloudPage(_) => self.cloud_page_emails.clone(),
        })
    }

    async fn email(&self, lookup: &EmailLookup) -> SourceResult<Option<Email>> {
        self.enter("email").await?;
        Ok(self
            .emails
            .iter()
            .find(|e| match lookup {
                EmailLookup::LegacyId(id) => e.id == *id,
                EmailLookup::Name(name) => e.name == *name,
            })
            .cloned())
    }

    async fn send_definitions(
        &self,
        _criteria: &SendDefinitionCriteria,
    ) -> SourceResult<Vec<EmailSendDefinition>> {
        self.enter("send_definitions").await?;
        Ok(self.send_definitions.clone())
    }

    async fn triggered_sends(&self, _email_id: &str) -> SourceResult<Vec<TriggeredSendDefinition>> {
        self.enter("triggered_sends").await?;
        Ok(self.triggered_sends.clone())
    }

    async fn journeys(
        &self,
        _criteria: &JourneyCriteria,
        _cancel: &CancellationToken,
    ) -> SourceResult<Vec<Journey>> {
        self.enter("journeys").await?;
        Ok(self.journeys.clone())
    }

    async fn scripts(&self, criteria: &ScriptCriteria) -> SourceResult<Vec<Script>> {
        self.enter("scripts").await?;
        Ok(match criteria {
            ScriptCriteria::References { .. } => self.scripts.clone(),
            ScriptCriteria::Name(name) => self
                .scripts
                .iter()
                .filter(|s| s.name == *name)
                .cloned()
                .collect(),
        })
    }

    async fn cloud_pages(&self, _criteria: &CloudPageCriteria) -> SourceResult<Vec<CloudPage>> {
        self.enter("cloud_pages").await?;
        Ok(self.cloud_pages.clone())
    }

    async fn activities(&self, _definition_object_id: &str) -> SourceResult<Vec<Activity>> {
        self.enter("activities").await?;
        Ok(self.activities.clone())
    }

    async fn automations(&self, _program_object_id: &str) -> SourceResult<Vec<Automation>> {
        self.enter("automations").await?;
        Ok(self.automations.clone())
    }
}

/// Credential provider handing out a fixed token, or refusing
pub struct StaticCredentials {
    token: Option<String>,
}

impl StaticCredentials {
    pub fn token(token: &str) -> Self {
        Self {
            token: Some(token.to_string()),
        }
    }

    pub fn unauthorized() -> Self {
        Self { token: None }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn token(&self) -> Result<String, CredentialError> {
        self.token.clone().ok_or(CredentialError::NoRefreshToken)
    }

    async fn invalidate(&self) {}
}

pub fn data_extension(name: &str, key: &str, object_id: &str) -> DataExtension {
    DataExtension {
        customer_key: key.to_string(),
        name: name.to_string(),
        category_id: "1001".to_string(),
        object_id: object_id.to_string(),
    }
}

pub fn query(name: &str) -> QueryDefinition {
    QueryDefinition {
        name: name.to_string(),
        object_id: format!("obj-{}", name),
    }
}

pub fn email(name: &str, id: &str) -> Email {
    Email {
        name: name.to_string(),
        id: id.to_string(),
    }
}

pub fn journey(name: &str) -> Journey {
    Journey {
        name: name.to_string(),
        id: format!("j-{}", name),
        event_definition_key: String::new(),
    }
}

/// Source with one private data extension and a value for every field
pub fn populated_source() -> MockAssetSource {
    MockAssetSource {
        private_data_extensions: vec![data_extension("Orders", "ORD-KEY", "de-orders")],
        folder_path: "Data Extensions > Sales".to_string(),
        queries_targeting: vec![query("Load Orders")],
        queries_including: vec![query("Join Orders")],
        imports: vec![ImportDefinition {
            name: "Nightly Orders".to_string(),
            object_id: "imp-1".to_string(),
        }],
        filters: vec![FilterActivity {
            name: "VIP Orders".to_string(),
            object_id: "flt-1".to_string(),
        }],
        content_emails: vec![email("Order Receipt", "501")],
        send_definitions: vec![EmailSendDefinition {
            name: "Weekly Orders".to_string(),
            object_id: "esd-1".to_string(),
            custom_object_id: "de-orders".to_string(),
            email_id: "501".to_string(),
        }],
        journeys: vec![journey("Post Purchase")],
        scripts: vec![Script {
            name: "Cleanup Orders".to_string(),
            object_id: "ssjs-1".to_string(),
        }],
        cloud_pages: vec![CloudPage {
            name: "Order Status".to_string(),
            html: String::new(),
        }],
        ..Default::default()
    }
}

/// Token cache pointing at an address nothing listens on
pub fn offline_tokens() -> Arc<TokenCache> {
    Arc::new(TokenCache::new(
        reqwest::Client::new(),
        OAuthSettings {
            auth_url: "http://127.0.0.1:9".to_string(),
            client_id: "client-123".to_string(),
            client_secret: "secret".to_string(),
            redirect_uri: "https://arf.test/".to_string(),
        },
    ))
}

pub fn test_state(source: Arc<MockAssetSource>, deadline: Duration) -> AppState {
    test_state_with_static(source, deadline, None)
}

pub fn test_state_with_static(
    source: Arc<MockAssetSource>,
    deadline: Duration,
    static_dir: Option<PathBuf>,
) -> AppState {
    AppState::new(
        source,
        offline_tokens(),
        Duration::from_secs(300),
        deadline,
        static_dir,
    )
}
