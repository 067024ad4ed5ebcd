//! Marketing platform adapter
//!
//! SOAP `Retrieve` calls serve the classic object model (data extensions,
//! folders, activity definitions, send definitions, automations); REST serves
//! content assets, journeys and scripts.

pub mod client;
pub mod matching;
pub mod rest;
pub mod soap;
mod source;

pub use client::{FanoutLimits, SfmcClient};
pub use source::SfmcSource;
