//! The metadata source seam and the snapshot it produces.

use crate::error::MetadataError;
use crate::types::{ContainerRecord, HostRecord, ServiceRecord, StackRecord};

/// Read access to the remote metadata service.
///
/// Implementations block; the poll loop calls them from a single thread.
pub trait MetadataSource {
    /// Opaque token that changes whenever the topology changes.
    fn get_version(&self) -> Result<String, MetadataError>;
    fn get_stacks(&self) -> Result<Vec<StackRecord>, MetadataError>;
    fn get_hosts(&self) -> Result<Vec<HostRecord>, MetadataError>;
    fn get_services(&self) -> Result<Vec<ServiceRecord>, MetadataError>;
    fn get_containers(&self) -> Result<Vec<ContainerRecord>, MetadataError>;
    /// The container record of the running process.
    fn get_self_container(&self) -> Result<ContainerRecord, MetadataError>;
}

impl<T: MetadataSource + ?Sized> MetadataSource for &T {
    fn get_version(&self) -> Result<String, MetadataError> {
        (**self).get_version()
    }
    fn get_stacks(&self) -> Result<Vec<StackRecord>, MetadataError> {
        (**self).get_stacks()
    }
    fn get_hosts(&self) -> Result<Vec<HostRecord>, MetadataError> {
        (**self).get_hosts()
    }
    fn get_services(&self) -> Result<Vec<ServiceRecord>, MetadataError> {
        (**self).get_services()
    }
    fn get_containers(&self) -> Result<Vec<ContainerRecord>, MetadataError> {
        (**self).get_containers()
    }
    fn get_self_container(&self) -> Result<ContainerRecord, MetadataError> {
        (**self).get_self_container()
    }
}

/// All record lists needed for one context build.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataSnapshot {
    pub stacks: Vec<StackRecord>,
    pub hosts: Vec<HostRecord>,
    pub services: Vec<ServiceRecord>,
    pub containers: Vec<ContainerRecord>,
    pub self_container: ContainerRecord,
}

impl MetadataSnapshot {
    /// Fetch every list from `source`. The first failure aborts the fetch.
    pub fn fetch<S: MetadataSource + ?Sized>(source: &S) -> Result<Self, MetadataError> {
        tracing::debug!("fetching metadata");
        Ok(MetadataSnapshot {
            services: source.get_services()?,
            containers: source.get_containers()?,
            hosts: source.get_hosts()?,
            self_container: source.get_self_container()?,
            stacks: source.get_stacks()?,
        })
    }
}
