//! The linked topology graph and the builder that produces it.
//!
//! # Ownership
//!
//! Every node lives in one arena `Vec` per kind inside [`Context`]. Links
//! between nodes are typed indices ([`StackId`], [`HostId`], [`ServiceId`],
//! [`ContainerId`]). The owning tree is Stack → Service → Container plus
//! Host → Container; every other link (service → stack, container → host,
//! child → parent) is a plain back-reference index.
//!
//! # Build passes
//!
//! 1. Index stacks by name and hosts by UUID.
//! 2. Index services by `stack.service`, link them to their stack, register
//!    primaries under the stack, then attach sidekick services to the
//!    primary that declares them.
//! 3. Link each container to its host and (when found) its service, and
//!    record primary containers per deployment unit.
//! 4. Join sidekick containers to the primary of their deployment unit.
//!
//! Every pass walks its input in order; ties resolve by input order.

use std::collections::HashMap;
use std::fmt;

use crate::error::ContextError;
use crate::metadata::{MetadataSnapshot, MetadataSource};
use crate::types::{
    service_key, ContainerRecord, HostRecord, ServicePort, ServiceRecord, StackRecord,
};

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

macro_rules! handle {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub usize);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

handle!(
    /// Index of a [`Stack`] in [`Context::stacks`].
    StackId
);
handle!(
    /// Index of a [`Host`] in [`Context::hosts`].
    HostId
);
handle!(
    /// Index of a [`Service`] in [`Context::services`].
    ServiceId
);
handle!(
    /// Index of a [`Container`] in [`Context::containers`].
    ContainerId
);

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Stack {
    pub record: StackRecord,
    /// Primary services only, in input order.
    pub services: Vec<ServiceId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Host {
    pub record: HostRecord,
    pub containers: Vec<ContainerId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Service {
    pub record: ServiceRecord,
    pub stack: StackId,
    pub ports: Vec<ServicePort>,
    pub primary: bool,
    pub sidekick: bool,
    pub sidekicks: Vec<ServiceId>,
    pub containers: Vec<ContainerId>,
    /// Primary service of the deployment unit, set for sidekick services.
    pub parent: Option<ServiceId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    pub record: ContainerRecord,
    pub ports: Vec<ServicePort>,
    pub primary: bool,
    pub sidekick: bool,
    pub host: HostId,
    pub service: Option<ServiceId>,
    pub parent: Option<ContainerId>,
    pub sidekicks: Vec<ContainerId>,
}

/// Graph nodes corresponding to the running process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelfRefs {
    pub stack: Option<StackId>,
    pub host: Option<HostId>,
    pub service: Option<ServiceId>,
    pub container: Option<ContainerId>,
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Immutable, fully linked topology for one poll cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    stacks: Vec<Stack>,
    hosts: Vec<Host>,
    services: Vec<Service>,
    containers: Vec<Container>,
    current: SelfRefs,
    service_index: HashMap<String, ServiceId>,
    host_index: HashMap<String, HostId>,
}

impl Context {
    /// Fetch a snapshot from `source` and build a context from it.
    pub fn fetch<S: MetadataSource + ?Sized>(source: &S) -> Result<Self, ContextError> {
        let snapshot = MetadataSnapshot::fetch(source)?;
        Self::build(snapshot)
    }

    /// Link a snapshot into a context. Either every link resolves or an
    /// error is returned; a partial context is never produced.
    pub fn build(snapshot: MetadataSnapshot) -> Result<Self, ContextError> {
        let MetadataSnapshot {
            stacks: stack_records,
            hosts: host_records,
            services: service_records,
            containers: container_records,
            self_container: me,
        } = snapshot;

        let mut current = SelfRefs::default();

        // Pass 1: stacks and hosts.
        let mut stack_index: HashMap<String, StackId> = HashMap::new();
        let mut stacks = Vec::with_capacity(stack_records.len());
        for record in stack_records {
            let id = StackId(stacks.len());
            stack_index.insert(record.name.clone(), id);
            if !me.stack_name.is_empty() && record.name == me.stack_name {
                current.stack = Some(id);
            }
            stacks.push(Stack {
                record,
                services: Vec::new(),
            });
        }

        let mut host_index: HashMap<String, HostId> = HashMap::new();
        let mut hosts = Vec::with_capacity(host_records.len());
        for record in host_records {
            let id = HostId(hosts.len());
            host_index.insert(record.uuid.clone(), id);
            if !me.host_uuid.is_empty() && record.uuid == me.host_uuid {
                current.host = Some(id);
            }
            hosts.push(Host {
                record,
                containers: Vec::new(),
            });
        }

        // Pass 2: services.
        let mut service_index: HashMap<String, ServiceId> = HashMap::new();
        let mut sidekick_parent: HashMap<String, ServiceId> = HashMap::new();
        let mut services: Vec<Service> = Vec::with_capacity(service_records.len());
        for mut record in service_records {
            let id = ServiceId(services.len());
            let Some(&stack) = stack_index.get(&record.stack_name) else {
                return Err(ContextError::UnknownStack {
                    service: record.name,
                    stack: record.stack_name,
                });
            };
            record.stack_uuid = stacks[stack.0].record.uuid.clone();

            service_index.insert(record.key(), id);
            for sidekick in &record.sidekicks {
                sidekick_parent.insert(service_key(&record.stack_name, sidekick), id);
            }

            let primary = record.is_primary();
            if primary {
                stacks[stack.0].services.push(id);
            }
            if !me.service_uuid.is_empty() && record.uuid == me.service_uuid {
                current.service = Some(id);
            }

            services.push(Service {
                ports: ServicePort::parse_all(&record.ports),
                record,
                stack,
                primary,
                sidekick: !primary,
                sidekicks: Vec::new(),
                containers: Vec::new(),
                parent: None,
            });
        }

        for id in (0..services.len()).map(ServiceId) {
            let key = services[id.0].record.key();
            if let Some(&parent) = sidekick_parent.get(&key) {
                if parent != id {
                    services[parent.0].sidekicks.push(id);
                }
            }
        }
        for (key, parent) in &sidekick_parent {
            if !service_index.contains_key(key) {
                tracing::warn!(
                    service = %services[parent.0].record.key(),
                    sidekick = %key,
                    "declared sidekick service not found in metadata",
                );
            }
        }

        // Pass 3: containers.
        let mut deployment_parent: HashMap<String, ContainerId> = HashMap::new();
        let mut containers: Vec<Container> = Vec::with_capacity(container_records.len());
        for record in container_records {
            let id = ContainerId(containers.len());
            let service = service_index.get(&record.service_key()).copied();
            let Some(&host) = host_index.get(&record.host_uuid) else {
                return Err(ContextError::UnknownHost {
                    container: record.name,
                    host: record.host_uuid,
                });
            };

            hosts[host.0].containers.push(id);
            if let Some(service) = service {
                services[service.0].containers.push(id);
            }

            let primary = record.is_primary();
            if primary {
                if let Some(unit) = record.deployment_unit() {
                    deployment_parent.insert(unit.to_string(), id);
                }
            }
            if !me.uuid.is_empty() && record.uuid == me.uuid {
                current.container = Some(id);
            }

            containers.push(Container {
                ports: ServicePort::parse_all(&record.ports),
                record,
                primary,
                sidekick: !primary,
                host,
                service,
                parent: None,
                sidekicks: Vec::new(),
            });
        }

        // Pass 4: deployment units.
        for id in (0..containers.len()).map(ContainerId) {
            if !containers[id.0].sidekick {
                continue;
            }
            let Some(&parent) = containers[id.0]
                .record
                .deployment_unit()
                .and_then(|unit| deployment_parent.get(unit))
            else {
                continue;
            };

            containers[id.0].parent = Some(parent);
            if let (Some(service), Some(parent_service)) =
                (containers[id.0].service, containers[parent.0].service)
            {
                if service != parent_service {
                    services[service.0].parent = Some(parent_service);
                }
            }
            containers[parent.0].sidekicks.push(id);
        }

        tracing::debug!(
            stacks = stacks.len(),
            hosts = hosts.len(),
            services = services.len(),
            containers = containers.len(),
            "finished building context",
        );

        Ok(Context {
            stacks,
            hosts,
            services,
            containers,
            current,
            service_index,
            host_index,
        })
    }

    pub fn stacks(&self) -> &[Stack] {
        &self.stacks
    }

    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    pub fn services(&self) -> &[Service] {
        &self.services
    }

    pub fn containers(&self) -> &[Container] {
        &self.containers
    }

    /// Nodes matching the running process.
    pub fn current(&self) -> SelfRefs {
        self.current
    }

    pub fn stack(&self, id: StackId) -> &Stack {
        &self.stacks[id.0]
    }

    pub fn host(&self, id: HostId) -> &Host {
        &self.hosts[id.0]
    }

    pub fn service(&self, id: ServiceId) -> &Service {
        &self.services[id.0]
    }

    pub fn container(&self, id: ContainerId) -> &Container {
        &self.containers[id.0]
    }

    /// Look up a service by its `stack.service` key.
    pub fn service_by_key(&self, key: &str) -> Option<ServiceId> {
        self.service_index.get(key).copied()
    }

    pub fn host_by_uuid(&self, uuid: &str) -> Option<HostId> {
        self.host_index.get(uuid).copied()
    }
}
