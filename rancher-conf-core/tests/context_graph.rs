//! Context builder linking tests: stack/service registration, sidekick
//! services, deployment-unit grouping, self references, failure modes.

use rancher_conf_core::{
    fake::FakeMetadata,
    types::{DEPLOYMENT_UNIT_LABEL, LAUNCH_CONFIG_LABEL, PRIMARY_LAUNCH_CONFIG},
    ContainerRecord, Context, ContextError, HostRecord, LabelMap, MetadataSnapshot,
    ServiceRecord, StackRecord,
};

fn stack(name: &str) -> StackRecord {
    StackRecord {
        uuid: format!("stack-{name}"),
        name: name.into(),
        ..Default::default()
    }
}

fn host(uuid: &str) -> HostRecord {
    HostRecord {
        uuid: uuid.into(),
        name: format!("node-{uuid}"),
        ..Default::default()
    }
}

fn service(stack: &str, name: &str, primary: &str, sidekicks: &[&str]) -> ServiceRecord {
    ServiceRecord {
        uuid: format!("svc-{stack}-{name}"),
        name: name.into(),
        stack_name: stack.into(),
        primary_service_name: primary.into(),
        sidekicks: sidekicks.iter().map(|s| s.to_string()).collect(),
        ports: vec!["80:8080/tcp".into(), "bogus".into()],
        ..Default::default()
    }
}

fn container(
    uuid: &str,
    stack: &str,
    service: &str,
    host: &str,
    primary: bool,
    unit: Option<&str>,
) -> ContainerRecord {
    let mut labels = LabelMap::default();
    let launch = if primary {
        PRIMARY_LAUNCH_CONFIG.to_string()
    } else {
        service.to_string()
    };
    labels.0.insert(LAUNCH_CONFIG_LABEL.into(), launch);
    if let Some(unit) = unit {
        labels.0.insert(DEPLOYMENT_UNIT_LABEL.into(), unit.into());
    }
    ContainerRecord {
        uuid: uuid.into(),
        name: uuid.into(),
        stack_name: stack.into(),
        service_name: service.into(),
        host_uuid: host.into(),
        labels,
        ..Default::default()
    }
}

/// `web` stack: primary `app` with sidekick `log`, standalone `db`.
/// `app` has two deployment units; `du-2` has no primary container.
fn topology() -> MetadataSnapshot {
    MetadataSnapshot {
        stacks: vec![stack("web"), stack("ops")],
        hosts: vec![host("h1"), host("h2")],
        services: vec![
            service("web", "log", "app", &[]),
            service("web", "app", "app", &["log"]),
            service("web", "db", "db", &[]),
        ],
        containers: vec![
            container("c-app-1", "web", "app", "h1", true, Some("du-1")),
            container("c-log-1", "web", "log", "h1", false, Some("du-1")),
            container("c-log-1b", "web", "log", "h2", false, Some("du-1")),
            container("c-log-2", "web", "log", "h2", false, Some("du-2")),
            container("c-db-1", "web", "db", "h2", true, Some("du-3")),
            container("c-orphan", "ops", "gone", "h1", false, None),
        ],
        self_container: ContainerRecord {
            uuid: "c-app-1".into(),
            stack_name: "web".into(),
            host_uuid: "h1".into(),
            service_uuid: "svc-web-app".into(),
            ..Default::default()
        },
    }
}

fn container_id(ctx: &Context, uuid: &str) -> rancher_conf_core::ContainerId {
    rancher_conf_core::ContainerId(
        ctx.containers()
            .iter()
            .position(|c| c.record.uuid == uuid)
            .expect("container present"),
    )
}

#[test]
fn only_primary_services_are_registered_under_their_stack() {
    let ctx = Context::build(topology()).expect("build");
    let web = &ctx.stacks()[0];
    let names: Vec<_> = web
        .services
        .iter()
        .map(|id| ctx.service(*id).record.name.as_str())
        .collect();
    assert_eq!(names, ["app", "db"]);
    for stack in ctx.stacks() {
        for id in &stack.services {
            assert!(ctx.service(*id).primary);
        }
    }
    assert!(ctx.stacks()[1].services.is_empty());
}

#[test]
fn sidekick_service_is_reachable_only_through_its_primary() {
    let ctx = Context::build(topology()).expect("build");
    let app = ctx.service_by_key("web.app").expect("app");
    let log = ctx.service_by_key("web.log").expect("log");

    assert_eq!(ctx.service(app).sidekicks, vec![log]);
    assert!(ctx.service(log).sidekick);
    assert!(!ctx.stacks()[0].services.contains(&log));
    assert_eq!(ctx.service(log).stack, ctx.service(app).stack);
}

#[test]
fn deployment_unit_joins_sidekicks_to_primary() {
    let ctx = Context::build(topology()).expect("build");
    let primary = container_id(&ctx, "c-app-1");
    let log_1 = container_id(&ctx, "c-log-1");
    let log_1b = container_id(&ctx, "c-log-1b");

    assert_eq!(ctx.container(primary).sidekicks, vec![log_1, log_1b]);
    for sidekick in [log_1, log_1b] {
        assert_eq!(ctx.container(sidekick).parent, Some(primary));
    }

    let app = ctx.service_by_key("web.app").expect("app");
    let log = ctx.service_by_key("web.log").expect("log");
    assert_eq!(ctx.service(log).parent, Some(app));
    assert_eq!(ctx.service(app).parent, None);
}

#[test]
fn unit_without_primary_leaves_sidekicks_unparented() {
    let ctx = Context::build(topology()).expect("build");
    let orphan_unit = container_id(&ctx, "c-log-2");
    assert_eq!(ctx.container(orphan_unit).parent, None);

    let unlabelled = container_id(&ctx, "c-orphan");
    assert_eq!(ctx.container(unlabelled).parent, None);
}

#[test]
fn containers_link_to_hosts_and_optional_services() {
    let ctx = Context::build(topology()).expect("build");
    let h1 = ctx.host_by_uuid("h1").expect("h1");
    let on_h1: Vec<_> = ctx
        .host(h1)
        .containers
        .iter()
        .map(|id| ctx.container(*id).record.uuid.as_str())
        .collect();
    assert_eq!(on_h1, ["c-app-1", "c-log-1", "c-orphan"]);

    let orphan = container_id(&ctx, "c-orphan");
    assert_eq!(ctx.container(orphan).service, None);

    let log = ctx.service_by_key("web.log").expect("log");
    assert_eq!(ctx.service(log).containers.len(), 3);
}

#[test]
fn ports_drop_malformed_entries() {
    let ctx = Context::build(topology()).expect("build");
    for service in ctx.services() {
        assert_eq!(service.ports.len(), 1);
        assert_eq!(service.ports[0].internal_port, "8080");
    }
}

#[test]
fn self_references_resolve() {
    let ctx = Context::build(topology()).expect("build");
    let me = ctx.current();
    assert_eq!(me.stack.map(|id| ctx.stack(id).record.name.as_str()), Some("web"));
    assert_eq!(me.host.map(|id| ctx.host(id).record.uuid.as_str()), Some("h1"));
    assert_eq!(me.service, ctx.service_by_key("web.app"));
    assert_eq!(me.container, Some(container_id(&ctx, "c-app-1")));
}

#[test]
fn unknown_stack_is_a_build_error() {
    let mut snapshot = topology();
    snapshot
        .services
        .push(service("missing", "ghost", "ghost", &[]));
    let err = Context::build(snapshot).unwrap_err();
    assert!(
        matches!(&err, ContextError::UnknownStack { service, stack } if service == "ghost" && stack == "missing"),
        "got: {err}"
    );
}

#[test]
fn unknown_host_is_a_build_error() {
    let mut snapshot = topology();
    snapshot
        .containers
        .push(container("c-lost", "web", "db", "h-none", true, None));
    let err = Context::build(snapshot).unwrap_err();
    assert!(matches!(err, ContextError::UnknownHost { .. }), "got: {err}");
    assert!(err.to_string().contains("h-none"));
}

#[test]
fn fetch_failure_propagates_without_context() {
    let fake = FakeMetadata::new(topology());
    fake.set_fail_fetch(true);
    let err = Context::fetch(&fake).unwrap_err();
    assert!(matches!(err, ContextError::Metadata(_)), "got: {err}");

    fake.set_fail_fetch(false);
    let ctx = Context::fetch(&fake).expect("fetch");
    assert_eq!(ctx.containers().len(), 6);
    assert_eq!(fake.fetch_calls(), 2);
}

#[test]
fn rebuilding_the_same_snapshot_is_deterministic() {
    let first = Context::build(topology()).expect("build");
    let second = Context::build(topology()).expect("build");
    assert_eq!(first, second);
}
