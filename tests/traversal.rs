#![allow(missing_docs)]

use std::sync::Arc;

use parking_lot::Mutex;
use skein::config::GraphConfig;
use skein::connector::GraphClient;
use skein::graph::{Node, Record, Service, ServiceRef};
use skein::location::{ClientLocation, NodeLocation};
use skein::matching::{Binding, EdgeStep, Matcher, Predicate, ResultSet, Step, Value, EDGE_VAR};
use skein::net::{ConnectionManager, LoopbackNetwork, LoopbackTransport, SessionCache};
use skein::{GraphError, Result};

/// Session cache that remembers which services it was asked for.
struct Recording {
    inner: SessionCache<LoopbackTransport>,
    targets: Mutex<Vec<String>>,
}

impl Recording {
    fn new(network: &Arc<LoopbackNetwork>) -> Arc<Self> {
        Arc::new(Self {
            inner: SessionCache::new(network.transport(), 8),
            targets: Mutex::new(Vec::new()),
        })
    }

    fn targets(&self) -> Vec<String> {
        self.targets.lock().clone()
    }
}

impl ConnectionManager for Recording {
    fn connect(&self, source: &ClientLocation, target_service: &str) -> Result<ServiceRef> {
        self.targets.lock().push(target_service.to_owned());
        self.inner.connect(source, target_service)
    }

    fn invalidate(&self, source: &ClientLocation, target_service: &str) {
        self.inner.invalidate(source, target_service)
    }
}

struct Fixture {
    network: Arc<LoopbackNetwork>,
    s1: Arc<Service>,
    recorder: Arc<Recording>,
}

/// S1.c.A fans out to a light local edge, a heavy local edge, and a heavy
/// edge into S2. B and C are leaves.
fn fixture(config: GraphConfig) -> Result<Fixture> {
    let network = LoopbackNetwork::new();
    let recorder = Recording::new(&network);

    let s1 = Service::builder("S1")
        .connections(recorder.clone())
        .config(config.clone())
        .build();
    let s2 = Service::builder("S2")
        .connections(Arc::new(SessionCache::new(network.transport(), 8)))
        .config(config)
        .build();

    let c1 = s1.add_client("c");
    let a = c1.add_node("A")?;
    c1.add_node("B")?;
    c1.add_node("D")?;
    s2.add_client("c").add_node("C")?;

    a.add_edge("S1.c.B".parse::<NodeLocation>()?, Record::new().with("w", 5i64))?;
    a.add_edge("S2.c.C".parse::<NodeLocation>()?, Record::new().with("w", 9i64))?;
    a.add_edge("S1.c.D".parse::<NodeLocation>()?, Record::new().with("w", 1i64))?;

    network.register(s1.clone());
    network.register(s2);
    Ok(Fixture {
        network,
        s1,
        recorder,
    })
}

fn heavy() -> EdgeStep {
    EdgeStep::new()
        .capture("w", &["w"])
        .guard(Predicate::gt(Value::var("w"), Value::lit(4i64)))
}

fn heavy_then_maybe_more() -> Matcher {
    Matcher::from_step(&Step::seq([Step::from(heavy()), Step::optional(Step::any())]))
        .expect("pattern compiles")
}

fn expected_heavy() -> ResultSet {
    ResultSet::from(vec![
        (Binding::new().bind("w", 5i64), 1),
        (Binding::new().bind("w", 9i64), 1),
    ])
}

fn start(fixture: &Fixture) -> Result<Arc<Node>> {
    fixture.s1.node(&"S1.c.A".parse::<NodeLocation>()?)
}

#[test]
fn heavy_edges_match_across_services() -> Result<()> {
    let fx = fixture(GraphConfig::default())?;
    let sender = ClientLocation::new("S1", "c");

    let results = start(&fx)?.traverse(&sender, &heavy_then_maybe_more())?;

    assert_eq!(results, expected_heavy());
    assert_eq!(fx.recorder.targets(), vec!["S2".to_string()]);
    Ok(())
}

#[test]
fn finished_patterns_do_not_cross_services() -> Result<()> {
    let fx = fixture(GraphConfig::default())?;
    let sender = ClientLocation::new("S1", "c");
    let single = Matcher::from_step(&Step::from(heavy()))?;

    let results = start(&fx)?.traverse(&sender, &single)?;

    assert_eq!(results, expected_heavy());
    assert!(fx.recorder.targets().is_empty());
    Ok(())
}

#[test]
fn offline_service_prunes_or_aborts_by_policy() -> Result<()> {
    let sender = ClientLocation::new("S1", "c");

    let fx = fixture(GraphConfig::default())?;
    fx.network.set_online("S2", false);
    let results = start(&fx)?.traverse(&sender, &heavy_then_maybe_more())?;
    assert_eq!(results, expected_heavy(), "bindings taken before the hop survive");

    let fx = fixture(GraphConfig::strict())?;
    fx.network.set_online("S2", false);
    let err = start(&fx)?
        .traverse(&sender, &heavy_then_maybe_more())
        .unwrap_err();
    assert!(err.is_connection_failure(), "got {err}");
    Ok(())
}

#[test]
fn comparison_errors_abort_under_either_policy() -> Result<()> {
    for config in [GraphConfig::default(), GraphConfig::strict()] {
        let fx = fixture(config)?;
        let a = start(&fx)?;
        a.add_edge("S1.c.B".parse::<NodeLocation>()?, Record::new().with("w", "heavy"))?;

        let err = a
            .traverse(&ClientLocation::new("S1", "c"), &heavy_then_maybe_more())
            .unwrap_err();
        assert!(matches!(err, GraphError::ComparisonType { .. }), "got {err}");
    }
    Ok(())
}

#[test]
fn unresolvable_start_fails_the_query() -> Result<()> {
    let fx = fixture(GraphConfig::default())?;
    let client = GraphClient::new(Arc::new(SessionCache::new(fx.network.transport(), 8)));
    let conn = client.connect_as("S1", "c");

    let err = conn
        .traverse(&"S1.c.ghost".parse::<NodeLocation>()?, &heavy_then_maybe_more())
        .unwrap_err();
    assert!(matches!(err, GraphError::NotFound { kind: "node", .. }), "got {err}");

    let results = conn.traverse(&"S1.c.A".parse::<NodeLocation>()?, &heavy_then_maybe_more())?;
    assert_eq!(results, expected_heavy());
    Ok(())
}

#[test]
fn guards_can_read_the_edge_being_matched() -> Result<()> {
    let fx = fixture(GraphConfig::default())?;
    let nine = EdgeStep::new().capture("w", &["w"]).guard(Predicate::equals(
        Value::prop(EDGE_VAR, &["w"]),
        Value::lit(9i64),
    ));
    let matcher = Matcher::from_step(&Step::from(nine))?;

    let results = start(&fx)?.traverse(&ClientLocation::new("S1", "c"), &matcher)?;
    assert_eq!(results, ResultSet::singleton(Binding::new().bind("w", 9i64)));
    assert!(results.iter().all(|b| !b.contains(EDGE_VAR)));
    Ok(())
}
