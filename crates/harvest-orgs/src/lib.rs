//! Harvest Organizations
//!
//! The capability contract every organization fulfils, a data-driven
//! implementation of it, JSON definitions and the registry the engine resolves
//! organizations from.

pub mod definition;
pub mod hooks;
pub mod organization;
pub mod policy;
pub mod registry;

pub use definition::{load_definitions, parse_definitions, OrgDefinition, SourceDefinition};
pub use hooks::{default_hidden_upload_category, DefaultHooks, OrgHooks};
pub use organization::{default_permitted_types, Organization};
pub use policy::{CategoryRule, IgnoreRule, OrgPolicy, PolicyHooks};
pub use registry::OrgRegistry;
