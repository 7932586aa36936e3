//! Routing between services: location resolution, the session-caching
//! connection layer, the call envelope, and an in-process transport.

pub mod connection;
pub mod locator;
pub mod loopback;
pub mod wire;

pub use connection::{ConnectionManager, Isolated, SessionCache, Transport};
pub use locator::{NodeLocator, Router};
pub use loopback::{Delivery, LoopbackNetwork, LoopbackTransport};
pub use wire::{Envelope, WireError};
