//! Guard expressions evaluated against a binding environment.
//!
//! [`Value`] is either a literal or a property path rooted at a literal or a
//! variable; [`Predicate`] is a boolean tree over values. Both are closed sum
//! types with exhaustive evaluation.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};
use crate::graph::value::{Fields, PropValue};
use crate::matching::binding::Binding;

/// Name → value lookup used during evaluation.
pub trait Environment {
    /// The value bound to `name`, if any.
    fn lookup(&self, name: &str) -> Option<&PropValue>;
}

impl Environment for Binding {
    fn lookup(&self, name: &str) -> Option<&PropValue> {
        self.get(name)
    }
}

/// An environment with one extra transient entry layered over a base.
pub(crate) struct Overlay<'a, E: ?Sized> {
    pub(crate) base: &'a E,
    pub(crate) name: &'a str,
    pub(crate) value: &'a PropValue,
}

impl<E: Environment + ?Sized> Environment for Overlay<'_, E> {
    fn lookup(&self, name: &str) -> Option<&PropValue> {
        if name == self.name {
            Some(self.value)
        } else {
            self.base.lookup(name)
        }
    }
}

/// Root of a property path.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    /// A fixed value.
    Literal(PropValue),
    /// A variable looked up in the environment.
    Var(String),
}

/// Value expression.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    /// Evaluates to the same value in every environment.
    Literal(PropValue),
    /// Resolves `entity`, unwraps an edge to its payload, then follows
    /// `path` one field at a time.
    Property {
        /// Root of the lookup.
        entity: Entity,
        /// Field names to follow, outermost first.
        #[serde(default)]
        path: Vec<String>,
    },
}

impl Value {
    /// Literal value.
    pub fn lit(value: impl Into<PropValue>) -> Self {
        Value::Literal(value.into())
    }

    /// The value bound to variable `name`.
    pub fn var(name: impl Into<String>) -> Self {
        Value::Property {
            entity: Entity::Var(name.into()),
            path: Vec::new(),
        }
    }

    /// Property path `name.path[0].path[1]...`.
    pub fn prop(name: impl Into<String>, path: &[&str]) -> Self {
        Value::Property {
            entity: Entity::Var(name.into()),
            path: path.iter().map(|s| (*s).to_owned()).collect(),
        }
    }

    /// Evaluates the expression.
    ///
    /// A missing field on the final step of a path yields `Null`; a missing
    /// field on any earlier step is a [`GraphError::MissingProperty`].
    pub fn eval<E: Environment + ?Sized>(&self, env: &E) -> Result<PropValue> {
        match self {
            Value::Literal(value) => Ok(value.clone()),
            Value::Property { entity, path } => {
                let root = match entity {
                    Entity::Literal(value) => value.clone(),
                    Entity::Var(name) => env.lookup(name).cloned().unwrap_or(PropValue::Null),
                };
                walk(root, path).map_err(|field| GraphError::MissingProperty {
                    path: self.to_string(),
                    field,
                })
            }
        }
    }

    /// Replaces references to the variables `$0`, `$1`, ... by the
    /// corresponding literal in `params`.
    pub(crate) fn bind_params(&mut self, params: &[PropValue]) -> Result<()> {
        if let Value::Property { entity, .. } = self {
            if let Entity::Var(name) = entity {
                if let Some(index) = name.strip_prefix('$') {
                    let index: usize = index.parse().map_err(|_| {
                        GraphError::InvalidArgument(format!("malformed parameter reference '{name}'"))
                    })?;
                    let value = params.get(index).cloned().ok_or_else(|| {
                        GraphError::InvalidArgument(format!(
                            "parameter ${index} referenced but only {} supplied",
                            params.len()
                        ))
                    })?;
                    *entity = Entity::Literal(value);
                }
            }
        }
        Ok(())
    }
}

/// Follows `path` from `root`. The error carries the missing field name.
pub(crate) fn walk(root: PropValue, path: &[String]) -> std::result::Result<PropValue, String> {
    let mut current = match root {
        PropValue::Edge(edge) => PropValue::Record(edge.payload),
        other => other,
    };
    for (idx, name) in path.iter().enumerate() {
        match current.field(name) {
            Some(next) => current = next,
            None if idx + 1 == path.len() => return Ok(PropValue::Null),
            None => return Err(name.clone()),
        }
    }
    Ok(current)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Literal(value) => write!(f, "{value}"),
            Value::Property { entity, path } => {
                match entity {
                    Entity::Literal(value) => write!(f, "{value}")?,
                    Entity::Var(name) => f.write_str(name)?,
                }
                for name in path {
                    write!(f, ".{name}")?;
                }
                Ok(())
            }
        }
    }
}

/// Boolean guard over values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    /// Negation.
    Not(Box<Predicate>),
    /// Conjunction.
    And(Box<Predicate>, Box<Predicate>),
    /// Disjunction.
    Or(Box<Predicate>, Box<Predicate>),
    /// Value equality, numeric across int/float.
    Equals(Value, Value),
    /// `lhs > rhs`, numeric only.
    GreaterThan(Value, Value),
    /// `lhs >= rhs`, numeric only.
    GreaterOrEqualThan(Value, Value),
    /// `lhs < rhs`, numeric only.
    LesserThan(Value, Value),
    /// `lhs <= rhs`, numeric only.
    LesserOrEqualThan(Value, Value),
}

impl Predicate {
    /// `!inner`
    #[allow(clippy::should_implement_trait)]
    pub fn not(inner: Predicate) -> Self {
        Predicate::Not(Box::new(inner))
    }

    /// `lhs and rhs`
    pub fn and(lhs: Predicate, rhs: Predicate) -> Self {
        Predicate::And(Box::new(lhs), Box::new(rhs))
    }

    /// `lhs or rhs`
    pub fn or(lhs: Predicate, rhs: Predicate) -> Self {
        Predicate::Or(Box::new(lhs), Box::new(rhs))
    }

    /// `lhs == rhs`
    pub fn equals(lhs: Value, rhs: Value) -> Self {
        Predicate::Equals(lhs, rhs)
    }

    /// `lhs > rhs`
    pub fn gt(lhs: Value, rhs: Value) -> Self {
        Predicate::GreaterThan(lhs, rhs)
    }

    /// `lhs >= rhs`
    pub fn ge(lhs: Value, rhs: Value) -> Self {
        Predicate::GreaterOrEqualThan(lhs, rhs)
    }

    /// `lhs < rhs`
    pub fn lt(lhs: Value, rhs: Value) -> Self {
        Predicate::LesserThan(lhs, rhs)
    }

    /// `lhs <= rhs`
    pub fn le(lhs: Value, rhs: Value) -> Self {
        Predicate::LesserOrEqualThan(lhs, rhs)
    }

    /// Evaluates the predicate. Comparing non-numeric operands is a
    /// [`GraphError::ComparisonType`] error rather than `false`.
    pub fn evaluate<E: Environment + ?Sized>(&self, env: &E) -> Result<bool> {
        match self {
            Predicate::Not(inner) => Ok(!inner.evaluate(env)?),
            Predicate::And(lhs, rhs) => Ok(lhs.evaluate(env)? && rhs.evaluate(env)?),
            Predicate::Or(lhs, rhs) => Ok(lhs.evaluate(env)? || rhs.evaluate(env)?),
            Predicate::Equals(lhs, rhs) => {
                let (l, r) = (lhs.eval(env)?, rhs.eval(env)?);
                if l.is_null() || r.is_null() {
                    return Ok(l.is_null() && r.is_null());
                }
                Ok(l == r)
            }
            Predicate::GreaterThan(lhs, rhs) => Ok(compare(lhs, rhs, env)?.is_gt()),
            Predicate::GreaterOrEqualThan(lhs, rhs) => Ok(compare(lhs, rhs, env)?.is_ge()),
            Predicate::LesserThan(lhs, rhs) => Ok(compare(lhs, rhs, env)?.is_lt()),
            Predicate::LesserOrEqualThan(lhs, rhs) => Ok(compare(lhs, rhs, env)?.is_le()),
        }
    }

    /// Applies `f` to every value in the tree.
    pub(crate) fn try_for_each_value(
        &mut self,
        f: &mut impl FnMut(&mut Value) -> Result<()>,
    ) -> Result<()> {
        match self {
            Predicate::Not(inner) => inner.try_for_each_value(f),
            Predicate::And(lhs, rhs) | Predicate::Or(lhs, rhs) => {
                lhs.try_for_each_value(f)?;
                rhs.try_for_each_value(f)
            }
            Predicate::Equals(lhs, rhs)
            | Predicate::GreaterThan(lhs, rhs)
            | Predicate::GreaterOrEqualThan(lhs, rhs)
            | Predicate::LesserThan(lhs, rhs)
            | Predicate::LesserOrEqualThan(lhs, rhs) => {
                f(lhs)?;
                f(rhs)
            }
        }
    }
}

fn compare<E: Environment + ?Sized>(lhs: &Value, rhs: &Value, env: &E) -> Result<Ordering> {
    let (l, r) = (lhs.eval(env)?, rhs.eval(env)?);
    match (l.as_f64(), r.as_f64()) {
        (Some(a), Some(b)) => Ok(canonical(a).total_cmp(&canonical(b))),
        _ => Err(GraphError::ComparisonType {
            lhs: format!("{l} ({})", l.type_name()),
            rhs: format!("{r} ({})", r.type_name()),
        }),
    }
}

fn canonical(value: f64) -> f64 {
    if value.is_nan() {
        f64::NAN
    } else {
        value
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Not(inner) => write!(f, "!{inner}"),
            Predicate::And(lhs, rhs) => write!(f, "({lhs} and {rhs})"),
            Predicate::Or(lhs, rhs) => write!(f, "({lhs} or {rhs})"),
            Predicate::Equals(lhs, rhs) => write!(f, "({lhs} == {rhs})"),
            Predicate::GreaterThan(lhs, rhs) => write!(f, "({lhs} > {rhs})"),
            Predicate::GreaterOrEqualThan(lhs, rhs) => write!(f, "({lhs} >= {rhs})"),
            Predicate::LesserThan(lhs, rhs) => write!(f, "({lhs} < {rhs})"),
            Predicate::LesserOrEqualThan(lhs, rhs) => write!(f, "({lhs} <= {rhs})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::edge::Edge;
    use crate::graph::value::Record;
    use crate::location::NodeLocation;

    fn env_with_edge() -> Binding {
        let payload = Record::new()
            .with("w", 5i64)
            .with("meta", Record::new().with("tag", "red"));
        Binding::new().bind("e", Edge::new(NodeLocation::new("S", "c", "b"), payload))
    }

    #[test]
    fn numeric_equality_coerces_ints_and_floats() {
        let env = Binding::new();
        assert!(Predicate::equals(Value::lit(1i64), Value::lit(1.0)).evaluate(&env).unwrap());
        assert!(!Predicate::equals(Value::lit(1i64), Value::lit("1")).evaluate(&env).unwrap());
    }

    #[test]
    fn absent_values_equal_only_each_other() {
        let env = Binding::with_unassigned(["x"]);
        let both_absent = Predicate::equals(Value::var("x"), Value::lit(PropValue::Null));
        let one_absent = Predicate::equals(Value::var("x"), Value::lit(0i64));
        assert!(both_absent.evaluate(&env).unwrap());
        assert!(!one_absent.evaluate(&env).unwrap());
    }

    #[test]
    fn property_path_unwraps_edges() {
        let env = env_with_edge();
        assert_eq!(Value::prop("e", &["w"]).eval(&env).unwrap(), PropValue::Int(5));
        assert_eq!(
            Value::prop("e", &["meta", "tag"]).eval(&env).unwrap(),
            PropValue::from("red")
        );
    }

    #[test]
    fn missing_trailing_property_is_null_but_intermediate_is_an_error() {
        let env = env_with_edge();
        assert_eq!(
            Value::prop("e", &["meta", "absent"]).eval(&env).unwrap(),
            PropValue::Null
        );
        let err = Value::prop("e", &["absent", "tag"]).eval(&env).unwrap_err();
        assert!(matches!(err, GraphError::MissingProperty { ref field, .. } if field == "absent"));
    }

    #[test]
    fn comparing_non_numbers_is_fatal() {
        let env = env_with_edge();
        let pred = Predicate::gt(Value::prop("e", &["meta", "tag"]), Value::lit(4i64));
        assert!(matches!(
            pred.evaluate(&env),
            Err(GraphError::ComparisonType { .. })
        ));
        let ok = Predicate::and(
            Predicate::ge(Value::prop("e", &["w"]), Value::lit(5.0)),
            Predicate::not(Predicate::lt(Value::prop("e", &["w"]), Value::lit(2i64))),
        );
        assert!(ok.evaluate(&env).unwrap());
    }

    #[test]
    fn params_replace_dollar_variables() {
        let mut value = Value::prop("$1", &["w"]);
        value
            .bind_params(&[PropValue::Null, PropValue::Record(Record::new().with("w", 3i64))])
            .unwrap();
        assert_eq!(value.eval(&Binding::new()).unwrap(), PropValue::Int(3));

        let mut missing = Value::var("$4");
        assert!(missing.bind_params(&[]).is_err());
    }

    #[test]
    fn display_reads_like_the_expression() {
        let pred = Predicate::gt(Value::prop("e", &["w"]), Value::lit(4i64));
        assert_eq!(pred.to_string(), "(e.w > 4)");
    }
}
