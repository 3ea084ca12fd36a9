//! rancher-conf core library: metadata records, the linked topology
//! context, and file configuration.
//!
//! - [`types`]: metadata records, label/metadata maps, port parsing
//! - [`metadata`]: [`MetadataSource`] seam and [`MetadataSnapshot`]
//! - [`context`]: [`Context`] graph and its builder
//! - [`config`]: YAML configuration and template jobs
//! - `fake`: scripted in-memory metadata source, built for tests and the
//!   `test-support` feature

pub mod config;
pub mod context;
pub mod error;
#[cfg(any(test, feature = "test-support"))]
pub mod fake;
pub mod metadata;
pub mod types;

pub use config::{Config, TemplateJob, STAGING_PLACEHOLDER};
pub use context::{
    Container, ContainerId, Context, Host, HostId, SelfRefs, Service, ServiceId, Stack, StackId,
};
pub use error::{ConfigError, ContextError, MetadataError};
pub use metadata::{MetadataSnapshot, MetadataSource};
pub use types::{
    ContainerRecord, HostRecord, LabelMap, MetadataMap, ServicePort, ServiceRecord, StackRecord,
};
