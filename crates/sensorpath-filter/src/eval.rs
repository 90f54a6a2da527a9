//! Evaluation of bound filters against in-memory entities.
//!
//! Evaluation is three-valued: a comparison whose operands are missing, null
//! or of the wrong runtime kind is *unknown*, and `and`/`or`/`not` follow
//! Kleene logic. Only a definite `true` counts as a match.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::binder::{BoundExpr, CompareMode, PropertyRef};
use crate::expr::BinaryOp;
use crate::value::{parse_time_value, Value};

/// An entity a filter can be evaluated against.
pub trait Filterable {
    fn entity_type(&self) -> &str;

    /// Raw JSON value of a property; `None` when absent.
    fn property(&self, name: &str) -> Option<Cow<'_, serde_json::Value>>;

    /// The entity reached through a to-one navigation role, if loaded.
    fn related(&self, navigation: &str) -> Option<&dyn Filterable>;
}

/// A self-contained entity state, as carried by change events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub entity_type: String,
    pub id: String,
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
    /// Entities reachable through to-one navigation, by role.
    #[serde(default)]
    pub related: BTreeMap<String, EntitySnapshot>,
}

impl EntitySnapshot {
    pub fn new(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.properties.insert(name.into(), value);
        self
    }

    pub fn with_related(mut self, role: impl Into<String>, entity: EntitySnapshot) -> Self {
        self.related.insert(role.into(), entity);
        self
    }
}

impl Filterable for EntitySnapshot {
    fn entity_type(&self) -> &str {
        &self.entity_type
    }

    fn property(&self, name: &str) -> Option<Cow<'_, serde_json::Value>> {
        if name == "id" {
            return Some(Cow::Owned(serde_json::Value::String(self.id.clone())));
        }
        self.properties.get(name).map(Cow::Borrowed)
    }

    fn related(&self, navigation: &str) -> Option<&dyn Filterable> {
        self.related.get(navigation).map(|e| e as &dyn Filterable)
    }
}

/// Stands in for an entity when folding constant sub-expressions.
struct NoEntity;

impl Filterable for NoEntity {
    fn entity_type(&self) -> &str {
        ""
    }

    fn property(&self, _name: &str) -> Option<Cow<'_, serde_json::Value>> {
        None
    }

    fn related(&self, _navigation: &str) -> Option<&dyn Filterable> {
        None
    }
}

/// Evaluates a sub-expression. `None` is the unknown value.
pub fn evaluate(expr: &BoundExpr, entity: &dyn Filterable) -> Option<Value> {
    match expr {
        BoundExpr::Literal { value } => Some(value.clone()),
        BoundExpr::Property(property) => read_property(property, entity),
        BoundExpr::Not { operand } => truth(evaluate(operand, entity)).map(|b| Value::Boolean(!b)),
        BoundExpr::Negate { operand } => match evaluate(operand, entity)? {
            Value::Integer(i) => i.checked_neg().map(Value::Integer),
            Value::Double(d) => Some(Value::Double(-d)),
            Value::Null => Some(Value::Null),
            _ => None,
        },
        BoundExpr::Logical { op, left, right } => {
            let l = truth(evaluate(left, entity));
            // Short-circuit on the deciding value.
            let decided = match op {
                BinaryOp::And => l == Some(false),
                _ => l == Some(true),
            };
            if decided {
                return l.map(Value::Boolean);
            }
            let r = truth(evaluate(right, entity));
            let result = match (op, l, r) {
                (BinaryOp::And, _, Some(false)) => Some(false),
                (BinaryOp::And, Some(true), Some(true)) => Some(true),
                (BinaryOp::Or, _, Some(true)) => Some(true),
                (BinaryOp::Or, Some(false), Some(false)) => Some(false),
                _ => None,
            };
            result.map(Value::Boolean)
        }
        BoundExpr::Arithmetic { op, left, right } => {
            arithmetic(*op, evaluate(left, entity)?, evaluate(right, entity)?)
        }
        BoundExpr::Compare {
            op,
            mode,
            left,
            right,
        } => {
            let l = evaluate(left, entity)?;
            let r = evaluate(right, entity)?;
            compare(*op, *mode, &l, &r).map(Value::Boolean)
        }
        BoundExpr::Call { function, args } => {
            let values = args
                .iter()
                .map(|a| evaluate(a, entity))
                .collect::<Option<Vec<_>>>()?;
            function.call(&values)
        }
    }
}

/// Evaluates an expression that references no property.
pub fn evaluate_constant(expr: &BoundExpr) -> Option<Value> {
    evaluate(expr, &NoEntity)
}

/// Whether the expression is definitely true for `entity`.
pub fn matches(expr: &BoundExpr, entity: &dyn Filterable) -> bool {
    truth(evaluate(expr, entity)) == Some(true)
}

fn truth(value: Option<Value>) -> Option<bool> {
    value.and_then(|v| v.as_bool())
}

fn read_property(property: &PropertyRef, entity: &dyn Filterable) -> Option<Value> {
    let mut target = entity;
    for role in &property.navigation {
        // An unloaded related entity reads as absent.
        match target.related(role) {
            Some(next) => target = next,
            None => return Some(Value::Null),
        }
    }
    let Some(raw) = target.property(&property.property) else {
        return Some(Value::Null);
    };
    if property.json_path.is_empty() {
        return Value::from_json(&raw, property.kind);
    }
    let mut node: &serde_json::Value = &raw;
    for key in &property.json_path {
        let next = match node {
            serde_json::Value::Object(map) => map.get(key),
            serde_json::Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        match next {
            Some(n) => node = n,
            None => return Some(Value::Null),
        }
    }
    Some(Value::from_json_dynamic(node))
}

fn arithmetic(op: BinaryOp, l: Value, r: Value) -> Option<Value> {
    if l.is_null() || r.is_null() {
        return Some(Value::Null);
    }
    if let (Value::Integer(a), Value::Integer(b)) = (&l, &r) {
        let (a, b) = (*a, *b);
        let result = match op {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Sub => a.checked_sub(b),
            BinaryOp::Mul => a.checked_mul(b),
            BinaryOp::Div => a.checked_div(b),
            BinaryOp::Mod => a.checked_rem(b),
            _ => None,
        };
        // Overflow falls back to floating point; zero divisors stay unknown.
        return match result {
            Some(v) => Some(Value::Integer(v)),
            None if b == 0 && matches!(op, BinaryOp::Div | BinaryOp::Mod) => None,
            None => float_arithmetic(op, a as f64, b as f64),
        };
    }
    float_arithmetic(op, l.as_f64()?, r.as_f64()?)
}

fn float_arithmetic(op: BinaryOp, a: f64, b: f64) -> Option<Value> {
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div | BinaryOp::Mod if b == 0.0 => return None,
        BinaryOp::Div => a / b,
        BinaryOp::Mod => a % b,
        _ => return None,
    };
    result.is_finite().then_some(Value::Double(result))
}

/// Outcome of relating two values: a full ordering, or only (in)equality.
enum Relation {
    Ordered(Ordering),
    Equal(bool),
}

fn compare(op: BinaryOp, mode: CompareMode, l: &Value, r: &Value) -> Option<bool> {
    if mode == CompareMode::NullCheck {
        let both_null = l.is_null() && r.is_null();
        return match op {
            BinaryOp::Eq => Some(both_null),
            BinaryOp::Ne => Some(!both_null),
            _ => None,
        };
    }
    if l.is_null() || r.is_null() || !admits(mode, l) || !admits(mode, r) {
        return None;
    }
    let relation = if mode == CompareMode::Id {
        relate_ids(l, r)?
    } else {
        relate(l, r)?
    };
    match (relation, op) {
        (Relation::Ordered(o), BinaryOp::Eq) => Some(o == Ordering::Equal),
        (Relation::Ordered(o), BinaryOp::Ne) => Some(o != Ordering::Equal),
        (Relation::Ordered(o), BinaryOp::Lt) => Some(o == Ordering::Less),
        (Relation::Ordered(o), BinaryOp::Le) => Some(o != Ordering::Greater),
        (Relation::Ordered(o), BinaryOp::Gt) => Some(o == Ordering::Greater),
        (Relation::Ordered(o), BinaryOp::Ge) => Some(o != Ordering::Less),
        (Relation::Equal(e), BinaryOp::Eq) => Some(e),
        (Relation::Equal(e), BinaryOp::Ne) => Some(!e),
        _ => None,
    }
}

/// Whether a runtime value fits the comparison fixed at bind time.
fn admits(mode: CompareMode, v: &Value) -> bool {
    match mode {
        CompareMode::Numeric => v.as_f64().is_some(),
        CompareMode::Text => matches!(v, Value::Text(_)),
        CompareMode::Boolean => matches!(v, Value::Boolean(_)),
        CompareMode::Instant => matches!(v, Value::Instant(_)),
        CompareMode::Period | CompareMode::TimeValue => {
            matches!(v, Value::Instant(_) | Value::Period(_))
        }
        CompareMode::Geometry => matches!(v, Value::Geometry(_)),
        CompareMode::Id => id_text(v).is_some(),
        CompareMode::NullCheck | CompareMode::Dynamic => true,
    }
}

fn relate(l: &Value, r: &Value) -> Option<Relation> {
    use Value::*;
    let relation = match (l, r) {
        (Integer(a), Integer(b)) => Relation::Ordered(a.cmp(b)),
        (Integer(_) | Double(_), Integer(_) | Double(_)) => {
            Relation::Ordered(l.as_f64()?.partial_cmp(&r.as_f64()?)?)
        }
        (Text(a), Text(b)) => Relation::Ordered(a.cmp(b)),
        (Boolean(a), Boolean(b)) => Relation::Equal(a == b),
        (Instant(a), Instant(b)) => Relation::Ordered(a.cmp(b)),
        (Instant(t), Period(p)) | (Period(p), Instant(t)) => Relation::Equal(p.contains(t)),
        (Period(a), Period(b)) => Relation::Equal(a == b),
        (Geometry(a), Geometry(b)) => Relation::Equal(a == b),
        (Json(a), Json(b)) => Relation::Equal(a == b),
        // Dynamic text read against a time literal.
        (Text(s), Instant(_) | Period(_)) => return relate(&parse_time_value(s)?, r),
        (Instant(_) | Period(_), Text(s)) => return relate(l, &parse_time_value(s)?),
        _ => return None,
    };
    Some(relation)
}

/// Canonical text of an id value; integral doubles read as integers.
fn id_text(v: &Value) -> Option<String> {
    match v {
        Value::Text(s) => Some(s.clone()),
        Value::Integer(i) => Some(i.to_string()),
        Value::Double(d) if d.fract() == 0.0 && d.abs() < i64::MAX as f64 => {
            Some((*d as i64).to_string())
        }
        _ => None,
    }
}

/// Ids order numerically when both are canonical integers (`7`, not `07`),
/// otherwise by their text.
fn relate_ids(l: &Value, r: &Value) -> Option<Relation> {
    let (a, b) = (id_text(l)?, id_text(r)?);
    let integer = |s: &str| s.parse::<i64>().ok().filter(|n| n.to_string() == s);
    let ordering = match (integer(&a), integer(&b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => a.cmp(&b),
    };
    Some(Relation::Ordered(ordering))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn snapshot_exposes_id_and_related() {
        let obs = EntitySnapshot::new("Observation", "7")
            .with_property("result", json!(4))
            .with_related(
                "Datastream",
                EntitySnapshot::new("Datastream", "1").with_property("name", json!("air")),
            );
        assert_eq!(obs.property("id").unwrap().as_ref(), &json!("7"));
        assert_eq!(
            obs.related("Datastream").unwrap().property("name").unwrap().as_ref(),
            &json!("air")
        );
        assert!(obs.related("FeatureOfInterest").is_none());
    }

    #[test]
    fn kleene_logic() {
        let t = || Box::new(BoundExpr::Literal { value: Value::Boolean(true) });
        let f = || Box::new(BoundExpr::Literal { value: Value::Boolean(false) });
        let u = || Box::new(BoundExpr::Literal { value: Value::Null });
        let logical = |op, left, right| BoundExpr::Logical { op, left, right };

        let e = NoEntity;
        assert_eq!(evaluate(&logical(BinaryOp::And, u(), f()), &e), Some(Value::Boolean(false)));
        assert_eq!(evaluate(&logical(BinaryOp::And, u(), t()), &e), None);
        assert_eq!(evaluate(&logical(BinaryOp::Or, u(), t()), &e), Some(Value::Boolean(true)));
        assert_eq!(evaluate(&logical(BinaryOp::Or, f(), u()), &e), None);
        assert_eq!(evaluate(&BoundExpr::Not { operand: u() }, &e), None);
    }

    #[test]
    fn runtime_zero_division_is_unknown() {
        assert_eq!(arithmetic(BinaryOp::Div, Value::Integer(4), Value::Integer(0)), None);
        assert_eq!(arithmetic(BinaryOp::Mod, Value::Double(4.0), Value::Integer(0)), None);
        assert_eq!(
            arithmetic(BinaryOp::Mod, Value::Integer(7), Value::Integer(2)),
            Some(Value::Integer(1))
        );
        assert_eq!(
            arithmetic(BinaryOp::Add, Value::Integer(i64::MAX), Value::Integer(1)),
            Some(Value::Double(i64::MAX as f64 + 1.0))
        );
    }

    #[test]
    fn mixed_numbers_compare() {
        assert_eq!(
            compare(BinaryOp::Eq, CompareMode::Numeric, &Value::Integer(2), &Value::Double(2.0)),
            Some(true)
        );
        assert_eq!(
            compare(BinaryOp::Lt, CompareMode::Dynamic, &Value::Text("a".into()), &Value::Integer(1)),
            None
        );
    }

    #[test]
    fn ids_compare_as_canonical_text() {
        let text = |s: &str| Value::Text(s.into());
        let eq = |l: &Value, r: &Value| compare(BinaryOp::Eq, CompareMode::Id, l, r);
        assert_eq!(eq(&text("7"), &text("7")), Some(true));
        assert_eq!(eq(&text("07"), &text("07")), Some(true));
        assert_eq!(eq(&text("7"), &Value::Integer(7)), Some(true));
        assert_eq!(eq(&text("07"), &Value::Integer(7)), Some(false));
        assert_eq!(eq(&text("abc"), &Value::Integer(7)), Some(false));
        assert_eq!(eq(&text("7"), &Value::Boolean(true)), None);
        assert_eq!(
            compare(BinaryOp::Lt, CompareMode::Id, &text("9"), &Value::Integer(10)),
            Some(true)
        );
    }
}
