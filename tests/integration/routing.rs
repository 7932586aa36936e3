#![allow(missing_docs)]

use std::sync::Arc;

use skein::config::GraphConfig;
use skein::graph::{Node, Record, Service};
use skein::location::{ClientLocation, NodeLocation};
use skein::matching::{Binding, EdgeStep, Matcher, Step};
use skein::metrics::CounterMetrics;
use skein::net::{LoopbackNetwork, SessionCache};
use skein::Result;

struct Network {
    net: Arc<LoopbackNetwork>,
    metrics: Arc<CounterMetrics>,
}

impl Network {
    /// S1.c.A -> S1.c.B, S2.c.C, S2.c.E; S2.c.C -> S3.c.F.
    fn three_services() -> Result<Self> {
        let net = LoopbackNetwork::new();
        let metrics = CounterMetrics::new();
        for name in ["S1", "S2", "S3"] {
            let sessions = SessionCache::new(net.transport(), 4).with_metrics(metrics.clone());
            let service = Service::builder(name)
                .connections(Arc::new(sessions))
                .metrics(metrics.clone())
                .config(GraphConfig::default())
                .build();
            net.register(service);
        }

        let s1 = net.service("S1")?.add_client("c");
        let s2 = net.service("S2")?.add_client("c");
        let s3 = net.service("S3")?.add_client("c");
        let a = s1.add_node("A")?;
        s1.add_node("B")?;
        let c = s2.add_node("C")?;
        s2.add_node("E")?;
        s3.add_node("F")?;

        a.add_edge(s1.location().node("B"), Record::new().with("w", 1i64))?;
        a.add_edge(s2.location().node("C"), Record::new().with("w", 2i64))?;
        a.add_edge(s2.location().node("E"), Record::new().with("w", 3i64))?;
        c.add_edge(s3.location().node("F"), Record::new().with("w", 4i64))?;
        Ok(Self { net, metrics })
    }

    fn start(&self) -> Result<Arc<Node>> {
        self.net
            .service("S1")?
            .node(&NodeLocation::new("S1", "c", "A"))
    }
}

fn capture_then_maybe_more() -> Matcher {
    let first = EdgeStep::new().capture("w", &["w"]);
    Matcher::from_step(&Step::seq([Step::from(first), Step::optional(Step::any())]))
        .expect("pattern compiles")
}

#[test]
fn local_targets_bypass_the_connection_layer() -> Result<()> {
    let metrics = CounterMetrics::new();
    let service = Service::builder("S").metrics(metrics.clone()).build();
    let client = service.add_client("c");
    let a = client.add_node("a")?;
    let b = client.add_node("b")?;
    client.add_node("z")?;
    a.add_edge(b.location().clone(), Record::new())?;
    b.add_edge(client.location().node("z"), Record::new())?;

    let one_or_two = Matcher::from_step(&Step::repeat(Step::any(), 1, Some(2)))?;
    let results = a.traverse(client.location(), &one_or_two)?;

    assert_eq!(results.multiplicity(&Binding::new()), 2);
    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.local_resolutions, 1);
    assert_eq!(snapshot.remote_resolutions, 0);
    assert_eq!(snapshot.sessions_opened, 0);
    Ok(())
}

#[test]
fn sessions_are_reused_and_dropped_after_failures() -> Result<()> {
    let network = Network::three_services()?;
    let sender = ClientLocation::new("S1", "c");
    let matcher = capture_then_maybe_more();

    let results = network.start()?.traverse(&sender, &matcher)?;
    assert_eq!(results.len(), 4);
    assert_eq!(results.multiplicity(&Binding::new().bind("w", 2i64)), 2);
    let snapshot = network.metrics.snapshot();
    assert_eq!(snapshot.sessions_opened, 1);
    assert_eq!(snapshot.sessions_reused, 1);
    assert_eq!(snapshot.remote_resolutions, 2);
    assert_eq!(snapshot.local_resolutions, 1);

    network.net.set_online("S2", false);
    let results = network.start()?.traverse(&sender, &matcher)?;
    assert_eq!(results.len(), 3, "one-edge matches are taken before the hop");
    let snapshot = network.metrics.snapshot();
    assert_eq!(snapshot.sessions_invalidated, 1);
    assert_eq!(snapshot.pruned_connection, 2);

    network.net.set_online("S2", true);
    network.start()?.traverse(&sender, &matcher)?;
    assert_eq!(network.metrics.snapshot().sessions_opened, 2);
    Ok(())
}

#[test]
fn sender_is_forwarded_across_hops() -> Result<()> {
    let network = Network::three_services()?;
    let reader = ClientLocation::new("S1", "reader");
    let up_to_three = Matcher::from_step(&Step::repeat(Step::any(), 1, Some(3)))?;

    network.start()?.traverse(&reader, &up_to_three)?;

    let deliveries = network.net.deliveries();
    assert!(deliveries
        .iter()
        .any(|d| d.service == "S3" && d.operation == "node.traverse"));
    for delivery in &deliveries {
        if delivery.operation == "service.handshake" {
            // Sessions belong to the hop's caller, not the query's origin.
            let caller = if delivery.service == "S3" { "S2" } else { "S1" };
            assert_eq!(delivery.sender, ClientLocation::new(caller, "c"));
        } else {
            assert_eq!(delivery.sender, reader, "{} on {}", delivery.operation, delivery.service);
        }
    }
    Ok(())
}
