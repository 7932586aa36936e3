//! Turning a pattern expression into a [`Matcher`].

use std::sync::Arc;

use tracing::debug;

use crate::error::{GraphError, Result};
use crate::graph::value::PropValue;
use crate::matching::pattern::{Matcher, Pattern, Step};

/// Compiles a path expression plus ordered parameters into a matcher.
///
/// Implementations are plugged into a service at build time; the engine
/// only ever sees the resulting [`Matcher`].
pub trait PatternCompiler: Send + Sync {
    /// Compiles `expression`, substituting `params` where it refers to them.
    fn compile(&self, expression: &str, params: &[PropValue]) -> Result<Matcher>;
}

/// Compiles the JSON form of a [`Step`] tree.
///
/// Any property rooted at a variable named `$N` is replaced by the literal
/// `params[N]` before compilation.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonPatternCompiler;

impl JsonPatternCompiler {
    /// Parses `expression` into a [`Step`] tree with parameters bound.
    pub fn parse(&self, expression: &str, params: &[PropValue]) -> Result<Step> {
        let mut step: Step = serde_json::from_str(expression).map_err(|err| {
            GraphError::InvalidArgument(format!("pattern is not a valid step tree: {err}"))
        })?;
        bind_params(&mut step, params)?;
        Ok(step)
    }
}

impl PatternCompiler for JsonPatternCompiler {
    fn compile(&self, expression: &str, params: &[PropValue]) -> Result<Matcher> {
        let step = self.parse(expression, params)?;
        let pattern = Pattern::compile(&step)?;
        debug!(
            states = pattern.state_count(),
            variables = pattern.variables().len(),
            "pattern.compiled"
        );
        Ok(Matcher::new(Arc::new(pattern)))
    }
}

fn bind_params(step: &mut Step, params: &[PropValue]) -> Result<()> {
    match step {
        Step::Edge(edge) => match edge.guard.as_mut() {
            Some(guard) => guard.try_for_each_value(&mut |value| value.bind_params(params)),
            None => Ok(()),
        },
        Step::Seq(steps) | Step::Alt(steps) => steps
            .iter_mut()
            .try_for_each(|step| bind_params(step, params)),
        Step::Optional(inner) | Step::Repeat { step: inner, .. } => bind_params(inner, params),
    }
}
