//! The graph: payload values, edges, and the local service / client / node
//! hierarchy together with the handles that make it network-transparent.

pub mod edge;
pub mod handle;
pub mod node;
pub mod service;
pub mod task;
pub mod value;

pub use edge::{Edge, EdgeSnapshot, EdgeStore, EdgeStoreFactory, MemoryEdgeStore, MemoryEdgeStores};
pub use handle::{ClientHandle, ClientRef, NodeHandle, NodeRef, ServiceHandle, ServiceRef};
pub use node::Node;
pub use service::{Client, Service, ServiceBuilder};
pub use task::{Extensions, InlineTaskManager, Task, TaskContext, TaskManager, TaskRegistry};
pub use value::{Fields, PropValue, Record};
