//! Skein: a distributed graph store with path-pattern traversal.
//!
//! Nodes belong to clients, clients to services. Edges carry a record
//! payload and may point at nodes hosted by other services. A query compiles
//! a path pattern into a [`matching::Matcher`] and walks it over the graph;
//! hops into another service go through the [`net`] connection layer, so a
//! traversal reads the same whether the graph is local or spread out.
//!
//! ```rust
//! use skein::graph::{Record, Service};
//! use skein::matching::{Binding, EdgeStep, Matcher, Predicate, Step, Value};
//!
//! # fn main() -> skein::Result<()> {
//! let service = Service::builder("S1").build();
//! let client = service.add_client("c");
//! let a = client.add_node("A")?;
//! client.add_node("B")?;
//! a.add_edge(client.location().node("B"), Record::new().with("w", 5i64))?;
//!
//! let heavy = EdgeStep::new()
//!     .capture("w", &["w"])
//!     .guard(Predicate::gt(Value::var("w"), Value::lit(4i64)));
//! let results = a.traverse(client.location(), &Matcher::from_step(&Step::from(heavy))?)?;
//! assert_eq!(results.multiplicity(&Binding::new().bind("w", 5i64)), 1);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod connector;
pub mod error;
pub mod graph;
pub mod location;
pub mod logging;
pub mod matching;
/// Traversal counters.
pub mod metrics;
pub mod net;
pub mod topology;

pub use error::{GraphError, Result};
