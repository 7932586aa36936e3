//! Path-pattern matching: bindings, guard expressions, and the automaton
//! that drives a traversal.

pub mod binding;
pub mod compiler;
pub mod expr;
pub mod pattern;

pub use binding::{Binding, ResultSet};
pub use compiler::{JsonPatternCompiler, PatternCompiler};
pub use expr::{Entity, Environment, Predicate, Value};
pub use pattern::{Capture, EdgeStep, Matcher, Pattern, Step, EDGE_VAR};
