#![allow(missing_docs)]

use std::sync::Arc;

use parking_lot::Mutex;
use skein::graph::{Extensions, PropValue, Record, Service, TaskContext};
use skein::location::{ClientLocation, NodeLocation};
use skein::net::{LoopbackNetwork, SessionCache};
use skein::{GraphError, Result};

#[derive(Default)]
struct CallLog {
    senders: Mutex<Vec<ClientLocation>>,
}

fn link(ctx: &TaskContext<'_>, params: &[PropValue]) -> Result<()> {
    let Some(PropValue::Location(target)) = params.first() else {
        return Err(GraphError::InvalidArgument(
            "link expects a target location".into(),
        ));
    };
    if let Some(log) = ctx.extensions.and_then(|ext| ext.get::<Arc<CallLog>>()) {
        log.senders.lock().push(ctx.sender.clone());
    }
    ctx.node
        .add_edge(target.clone(), Record::new().with("via", "task"))
}

fn network(log: &Arc<CallLog>) -> Result<Arc<LoopbackNetwork>> {
    let net = LoopbackNetwork::new();
    for name in ["S1", "S2"] {
        let service = Service::builder(name)
            .connections(Arc::new(SessionCache::new(net.transport(), 4)))
            .extensions(Extensions::new(Arc::clone(log)))
            .build();
        service.register_task_kind("link", Arc::new(link));
        service.add_client("c").add_node("n")?;
        net.register(service);
    }
    Ok(net)
}

#[test]
fn local_tasks_run_with_the_callers_identity() -> Result<()> {
    let log = Arc::new(CallLog::default());
    let net = network(&log)?;
    let node = net.service("S1")?.node(&NodeLocation::new("S1", "c", "n"))?;
    let caller = ClientLocation::new("S1", "admin");

    node.register_task("attach", "link")?;
    node.run_task(&caller, "attach", &[PropValue::from(NodeLocation::new("S2", "c", "n"))])?;

    let edges = node.edges();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].target, NodeLocation::new("S2", "c", "n"));
    assert_eq!(edges[0].payload.get("via"), Some(&PropValue::from("task")));
    assert_eq!(*log.senders.lock(), vec![caller]);
    Ok(())
}

#[test]
fn remote_tasks_are_bound_and_called_through_handles() -> Result<()> {
    let log = Arc::new(CallLog::default());
    let net = network(&log)?;
    let me = ClientLocation::new("S1", "c");
    let remote = net
        .service("S1")?
        .client("c")?
        .connect("S2")?
        .lookup_client(&me, "c")?
        .lookup_node(&me, "n")?;

    remote.add_task(&me, "attach", "link")?;
    remote.call_task(&me, "attach", &[PropValue::from(NodeLocation::new("S1", "c", "n"))])?;

    let edges = remote.outgoing_edges(&me)?;
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].target.service(), "S1");
    assert_eq!(*log.senders.lock(), vec![me.clone()]);
    assert!(net
        .deliveries()
        .iter()
        .any(|d| d.service == "S2" && d.operation == "node.call_task" && d.sender == me));
    Ok(())
}

#[test]
fn unknown_tasks_and_bad_params_are_reported() -> Result<()> {
    let log = Arc::new(CallLog::default());
    let net = network(&log)?;
    let me = ClientLocation::new("S1", "c");
    let remote = net
        .service("S1")?
        .client("c")?
        .connect("S2")?
        .lookup_client(&me, "c")?
        .lookup_node(&me, "n")?;

    let err = remote.add_task(&me, "attach", "teleport").unwrap_err();
    assert!(matches!(err, GraphError::NotFound { kind: "task kind", .. }), "got {err}");

    let err = remote.call_task(&me, "attach", &[]).unwrap_err();
    assert!(matches!(err, GraphError::NotFound { kind: "task", .. }), "got {err}");

    remote.add_task(&me, "attach", "link")?;
    let err = remote
        .call_task(&me, "attach", &[PropValue::Int(3)])
        .unwrap_err();
    assert!(matches!(err, GraphError::Remote(_)), "got {err}");
    assert!(log.senders.lock().is_empty());
    Ok(())
}
