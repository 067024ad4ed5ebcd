//! Root entity resolution
//!
//! Data extensions are looked up in the caller's own business unit first and,
//! only when that comes back empty, in the enterprise-wide shared scope.

use crate::source::{AssetSource, DataExtensionLookup, EmailLookup, Scope, SourceError};
use arf_common::models::{DataExtension, Email};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Which scope a root entity was found in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Private,
    Shared,
}

impl ScopeKind {
    pub fn is_shared(self) -> bool {
        self == ScopeKind::Shared
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved<T> {
    pub entity: T,
    pub scope: ScopeKind,
}

/// Resolve a data extension, private scope first, then shared
///
/// Adapter errors from either lookup are returned unchanged.
pub async fn resolve_data_extension(
    source: &dyn AssetSource,
    lookup: &DataExtensionLookup,
    enterprise_id: &str,
) -> Result<Resolved<DataExtension>, ResolveError> {
    let private = source.data_extensions(lookup, &Scope::Private).await?;
    if let Some(entity) = private.into_iter().next() {
        debug!(name = %entity.name, "Resolved data extension in private scope");
        return Ok(Resolved {
            entity,
            scope: ScopeKind::Private,
        });
    }

    let shared_scope = Scope::Shared {
        enterprise_id: enterprise_id.to_string(),
    };
    let shared = source.data_extensions(lookup, &shared_scope).await?;
    if let Some(entity) = shared.into_iter().next() {
        info!(name = %entity.name, "Resolved data extension in shared scope");
        return Ok(Resolved {
            entity,
            scope: ScopeKind::Shared,
        });
    }

    Err(ResolveError::NotFound(format!(
        "Data extension with {} {:?}",
        lookup.property(),
        lookup.value()
    )))
}

/// Resolve an email by legacy id or name
pub async fn resolve_email(
    source: &dyn AssetSource,
    lookup: &EmailLookup,
) -> Result<Email, ResolveError> {
    match source.email(lookup).await? {
        Some(email) => Ok(email),
        None => Err(ResolveError::NotFound(match lookup {
            EmailLookup::LegacyId(id) => format!("Email with ID {:?}", id),
            EmailLookup::Name(name) => format!("Email named {:?}", name),
        })),
    }
}
