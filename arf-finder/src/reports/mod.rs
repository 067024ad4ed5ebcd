//! Report definitions per root kind
//!
//! Each fan-out report pairs a field enum (the vocabulary), a value enum (one
//! tagged payload per field), the report record and a plan mapping every field
//! to its adapter call.

pub mod automation;
pub mod cloud_page;
pub mod data_extension;
pub mod email;

pub use automation::{find_automations, ActivityType, AutomationLookupError, AutomationReport};
pub use cloud_page::{CloudPageField, CloudPagePlan, CloudPageReport};
pub use data_extension::{DataExtensionField, DataExtensionPlan, DataExtensionReport};
pub use email::{EmailField, EmailPlan, EmailReport};
