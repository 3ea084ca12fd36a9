//! Template context: serializable view of a [`Context`] graph.
//!
//! The arena graph links nodes by index; templates need nested values. Each
//! view embeds the nodes it owns (stack → services → containers, host →
//! containers) and names its back-references by key instead of nesting them,
//! so the tree stays finite.

use std::collections::BTreeMap;

use serde::Serialize;

use rancher_conf_core::{
    Container, ContainerId, Context, HostId, LabelMap, MetadataMap, Service, ServiceId,
    ServicePort, StackId,
};

use crate::error::RenderError;

/// Root rendering payload.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateContext {
    pub stacks: Vec<StackView>,
    pub hosts: Vec<HostView>,
    /// Every service, primaries and sidekicks, in metadata order.
    pub services: Vec<ServiceView>,
    pub containers: Vec<ContainerView>,
    /// Nodes matching the running process.
    pub current: CurrentView,
}

#[derive(Debug, Clone, Serialize)]
pub struct StackView {
    pub uuid: String,
    pub name: String,
    pub environment_name: String,
    pub system: bool,
    pub services: Vec<ServiceView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HostView {
    pub uuid: String,
    pub name: String,
    pub hostname: String,
    pub agent_ip: String,
    pub labels: LabelMap,
    pub containers: Vec<ContainerView>,
}

/// Host fields embedded in a container.
#[derive(Debug, Clone, Serialize)]
pub struct HostRef {
    pub uuid: String,
    pub name: String,
    pub hostname: String,
    pub agent_ip: String,
    pub labels: LabelMap,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceView {
    pub uuid: String,
    pub name: String,
    pub stack_name: String,
    pub stack_uuid: String,
    pub kind: String,
    pub hostname: String,
    pub vip: String,
    pub fqdn: String,
    pub state: String,
    pub scale: u32,
    pub external_ips: Vec<String>,
    pub labels: LabelMap,
    pub links: LabelMap,
    pub metadata: MetadataMap,
    pub ports: Vec<ServicePort>,
    pub primary: bool,
    pub sidekick: bool,
    /// Name of the primary service, set for sidekicks.
    pub parent: Option<String>,
    pub sidekicks: Vec<ServiceView>,
    pub containers: Vec<ContainerView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContainerView {
    pub uuid: String,
    pub name: String,
    pub stack_name: String,
    pub service_name: String,
    pub primary_ip: String,
    pub ips: Vec<String>,
    pub state: String,
    pub health_state: String,
    pub create_index: u64,
    pub start_count: u64,
    pub labels: LabelMap,
    pub links: LabelMap,
    pub ports: Vec<ServicePort>,
    pub primary: bool,
    pub sidekick: bool,
    pub host: HostRef,
    /// `stack.service` key when the container belongs to a known service.
    pub service: Option<String>,
    /// UUID of the primary container of the deployment unit.
    pub parent: Option<String>,
    pub sidekicks: Vec<ContainerView>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CurrentView {
    pub stack: Option<StackView>,
    pub host: Option<HostView>,
    pub service: Option<ServiceView>,
    pub container: Option<ContainerView>,
}

impl TemplateContext {
    /// Build the view tree for `ctx`.
    pub fn from_context(ctx: &Context) -> Self {
        let me = ctx.current();
        TemplateContext {
            stacks: (0..ctx.stacks().len())
                .map(|i| stack_view(ctx, StackId(i)))
                .collect(),
            hosts: (0..ctx.hosts().len())
                .map(|i| host_view(ctx, HostId(i)))
                .collect(),
            services: (0..ctx.services().len())
                .map(|i| service_view(ctx, ServiceId(i), true))
                .collect(),
            containers: (0..ctx.containers().len())
                .map(|i| container_view(ctx, ContainerId(i)))
                .collect(),
            current: CurrentView {
                stack: me.stack.map(|id| stack_view(ctx, id)),
                host: me.host.map(|id| host_view(ctx, id)),
                service: me.service.map(|id| service_view(ctx, id, true)),
                container: me.container.map(|id| container_view(ctx, id)),
            },
        }
    }

    /// Services keyed by `stack.service`.
    pub fn services_by_key(&self) -> BTreeMap<String, &ServiceView> {
        self.services
            .iter()
            .map(|s| (format!("{}.{}", s.stack_name, s.name), s))
            .collect()
    }

    /// Hosts keyed by UUID.
    pub fn hosts_by_uuid(&self) -> BTreeMap<String, &HostView> {
        self.hosts.iter().map(|h| (h.uuid.clone(), h)).collect()
    }

    /// Convert to a [`tera::Context`] for rendering.
    pub fn to_tera_context(&self) -> Result<tera::Context, RenderError> {
        tera::Context::from_serialize(self).map_err(RenderError::from)
    }
}

fn stack_view(ctx: &Context, id: StackId) -> StackView {
    let stack = ctx.stack(id);
    StackView {
        uuid: stack.record.uuid.clone(),
        name: stack.record.name.clone(),
        environment_name: stack.record.environment_name.clone(),
        system: stack.record.system,
        services: stack
            .services
            .iter()
            .map(|s| service_view(ctx, *s, true))
            .collect(),
    }
}

fn host_view(ctx: &Context, id: HostId) -> HostView {
    let host = ctx.host(id);
    HostView {
        uuid: host.record.uuid.clone(),
        name: host.record.name.clone(),
        hostname: host.record.hostname.clone(),
        agent_ip: host.record.agent_ip.clone(),
        labels: host.record.labels.clone(),
        containers: host
            .containers
            .iter()
            .map(|c| container_view(ctx, *c))
            .collect(),
    }
}

fn host_ref(ctx: &Context, id: HostId) -> HostRef {
    let host = &ctx.host(id).record;
    HostRef {
        uuid: host.uuid.clone(),
        name: host.name.clone(),
        hostname: host.hostname.clone(),
        agent_ip: host.agent_ip.clone(),
        labels: host.labels.clone(),
    }
}

/// `with_sidekicks` stops the recursion after one level even if the
/// metadata declares services as sidekicks of each other.
fn service_view(ctx: &Context, id: ServiceId, with_sidekicks: bool) -> ServiceView {
    let service: &Service = ctx.service(id);
    let r = &service.record;
    ServiceView {
        uuid: r.uuid.clone(),
        name: r.name.clone(),
        stack_name: r.stack_name.clone(),
        stack_uuid: r.stack_uuid.clone(),
        kind: r.kind.clone(),
        hostname: r.hostname.clone(),
        vip: r.vip.clone(),
        fqdn: r.fqdn.clone(),
        state: r.state.clone(),
        scale: r.scale,
        external_ips: r.external_ips.clone(),
        labels: r.labels.clone(),
        links: r.links.clone(),
        metadata: r.metadata.clone(),
        ports: service.ports.clone(),
        primary: service.primary,
        sidekick: service.sidekick,
        parent: service.parent.map(|p| ctx.service(p).record.name.clone()),
        sidekicks: if with_sidekicks {
            service
                .sidekicks
                .iter()
                .map(|s| service_view(ctx, *s, false))
                .collect()
        } else {
            Vec::new()
        },
        containers: service
            .containers
            .iter()
            .map(|c| container_view(ctx, *c))
            .collect(),
    }
}

fn container_view(ctx: &Context, id: ContainerId) -> ContainerView {
    let container: &Container = ctx.container(id);
    let r = &container.record;
    ContainerView {
        uuid: r.uuid.clone(),
        name: r.name.clone(),
        stack_name: r.stack_name.clone(),
        service_name: r.service_name.clone(),
        primary_ip: r.primary_ip.clone(),
        ips: r.ips.clone(),
        state: r.state.clone(),
        health_state: r.health_state.clone(),
        create_index: r.create_index,
        start_count: r.start_count,
        labels: r.labels.clone(),
        links: r.links.clone(),
        ports: container.ports.clone(),
        primary: container.primary,
        sidekick: container.sidekick,
        host: host_ref(ctx, container.host),
        service: container.service.map(|s| ctx.service(s).record.key()),
        parent: container
            .parent
            .map(|p| ctx.container(p).record.uuid.clone()),
        // Sidekick containers never carry sidekicks of their own.
        sidekicks: container
            .sidekicks
            .iter()
            .map(|c| container_view(ctx, *c))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rancher_conf_core::{
        ContainerRecord, HostRecord, MetadataSnapshot, ServiceRecord, StackRecord,
    };

    fn cyclic_sidekicks() -> Context {
        let svc = |name: &str, sidekick: &str| ServiceRecord {
            name: name.into(),
            stack_name: "s".into(),
            primary_service_name: name.into(),
            sidekicks: vec![sidekick.into()],
            ..Default::default()
        };
        Context::build(MetadataSnapshot {
            stacks: vec![StackRecord {
                name: "s".into(),
                ..Default::default()
            }],
            hosts: vec![HostRecord {
                uuid: "h".into(),
                ..Default::default()
            }],
            services: vec![svc("a", "b"), svc("b", "a")],
            containers: vec![ContainerRecord {
                uuid: "c".into(),
                stack_name: "s".into(),
                service_name: "a".into(),
                host_uuid: "h".into(),
                ..Default::default()
            }],
            ..Default::default()
        })
        .expect("build")
    }

    #[test]
    fn cyclic_sidekick_declarations_stay_finite() {
        let ctx = cyclic_sidekicks();
        let view = TemplateContext::from_context(&ctx);
        assert_eq!(view.services[0].sidekicks.len(), 1);
        assert!(view.services[0].sidekicks[0].sidekicks.is_empty());
        view.to_tera_context().expect("context conversion");
    }

    #[test]
    fn container_view_names_host_and_service() {
        let ctx = cyclic_sidekicks();
        let view = TemplateContext::from_context(&ctx);
        let c = &view.containers[0];
        assert_eq!(c.host.uuid, "h");
        assert_eq!(c.service.as_deref(), Some("s.a"));
        assert_eq!(view.hosts[0].containers.len(), 1);
        assert!(view.current.container.is_none());
    }
}
