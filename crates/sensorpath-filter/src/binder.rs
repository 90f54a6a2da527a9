//! Binding: checks a parsed filter against an entity type and fixes the
//! comparison semantics of every operator.
//!
//! Binding rejects what can be known to be wrong before any entity is seen:
//! unknown properties, to-many navigation inside a value path, operators over
//! incompatible kinds, ordering of time periods and division by a constant
//! zero. Dynamically typed properties (`Any`, `Json`, ids) defer their checks
//! to evaluation.

use sensorpath_model::{EntityModel, EntityTypeDescriptor, Multiplicity, PropertyKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::error::InvalidQueryError;
use crate::eval;
use crate::expr::{BinaryOp, FilterExpr, UnaryOp};
use crate::function::Function;
use crate::geometry;
use crate::value::{parse_instant, parse_time_value, Value};

/// Static kind of a bound sub-expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Null,
    Boolean,
    Number,
    Text,
    Instant,
    Period,
    /// Instant or period, decided per value.
    TimeValue,
    Geometry,
    /// Only known once evaluated.
    Dynamic,
}

impl ValueKind {
    pub fn of_property(kind: PropertyKind) -> Self {
        match kind {
            PropertyKind::Text => ValueKind::Text,
            PropertyKind::Number => ValueKind::Number,
            PropertyKind::Boolean => ValueKind::Boolean,
            PropertyKind::Instant => ValueKind::Instant,
            PropertyKind::Period => ValueKind::Period,
            PropertyKind::TimeValue => ValueKind::TimeValue,
            PropertyKind::Geometry => ValueKind::Geometry,
            PropertyKind::Id | PropertyKind::Json | PropertyKind::Any => ValueKind::Dynamic,
        }
    }

    pub fn of_value(value: &Value) -> Self {
        match value {
            Value::Null => ValueKind::Null,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Integer(_) | Value::Double(_) => ValueKind::Number,
            Value::Text(_) => ValueKind::Text,
            Value::Instant(_) => ValueKind::Instant,
            Value::Period(_) => ValueKind::Period,
            Value::Geometry(_) => ValueKind::Geometry,
            Value::Json(_) => ValueKind::Dynamic,
        }
    }

    fn is_boolean(self) -> bool {
        matches!(self, ValueKind::Boolean | ValueKind::Dynamic)
    }

    fn is_numeric(self) -> bool {
        matches!(self, ValueKind::Number | ValueKind::Dynamic)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValueKind::Null => "null",
            ValueKind::Boolean => "boolean",
            ValueKind::Number => "number",
            ValueKind::Text => "text",
            ValueKind::Instant => "instant",
            ValueKind::Period => "time period",
            ValueKind::TimeValue => "time value",
            ValueKind::Geometry => "geometry",
            ValueKind::Dynamic => "dynamic value",
        })
    }
}

/// How a bound comparison treats its operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareMode {
    Numeric,
    /// Ordinal string comparison.
    Text,
    Boolean,
    Instant,
    /// Period equality, or instant-in-period containment. `eq` and `ne` only.
    Period,
    /// Instants order; periods fall back to [`CompareMode::Period`].
    TimeValue,
    Geometry,
    /// One side is the `null` literal.
    NullCheck,
    /// One side is an entity id: ids compare as their text, or numerically
    /// when both sides are integers.
    Id,
    Dynamic,
}

/// A property reference resolved against the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyRef {
    /// To-one navigation roles walked before reading the property.
    pub navigation: Vec<String>,
    pub property: String,
    pub kind: PropertyKind,
    /// Keys below a JSON-valued property, e.g. `properties/owner`.
    pub json_path: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum BoundExpr {
    Literal {
        value: Value,
    },
    Property(PropertyRef),
    Not {
        operand: Box<BoundExpr>,
    },
    Negate {
        operand: Box<BoundExpr>,
    },
    Compare {
        op: BinaryOp,
        mode: CompareMode,
        left: Box<BoundExpr>,
        right: Box<BoundExpr>,
    },
    Arithmetic {
        op: BinaryOp,
        left: Box<BoundExpr>,
        right: Box<BoundExpr>,
    },
    Logical {
        op: BinaryOp,
        left: Box<BoundExpr>,
        right: Box<BoundExpr>,
    },
    Call {
        function: Function,
        args: Vec<BoundExpr>,
    },
}

// ============================================================================
// Binder
// ============================================================================

pub struct Binder<'m> {
    model: &'m EntityModel,
}

impl<'m> Binder<'m> {
    pub fn new(model: &'m EntityModel) -> Self {
        Self { model }
    }

    /// Binds a whole filter; the result must be a boolean condition.
    pub fn bind(
        &self,
        expr: &FilterExpr,
        entity_type: &EntityTypeDescriptor,
    ) -> Result<BoundExpr, InvalidQueryError> {
        let result = self.bind_expr(expr, entity_type).and_then(|(bound, kind)| {
            if kind.is_boolean() {
                Ok(bound)
            } else {
                Err(InvalidQueryError::NotBoolean(kind))
            }
        });
        if let Err(err) = &result {
            debug!(entity_type = %entity_type.name, filter = %expr, error = %err, "filter rejected");
        }
        result
    }

    fn bind_expr(
        &self,
        expr: &FilterExpr,
        owner: &EntityTypeDescriptor,
    ) -> Result<(BoundExpr, ValueKind), InvalidQueryError> {
        match expr {
            FilterExpr::Literal { value } => Ok((
                BoundExpr::Literal {
                    value: value.clone(),
                },
                ValueKind::of_value(value),
            )),
            FilterExpr::Property { path } => {
                let property = self.bind_property(path, owner)?;
                let kind = if property.json_path.is_empty() {
                    ValueKind::of_property(property.kind)
                } else {
                    ValueKind::Dynamic
                };
                Ok((BoundExpr::Property(property), kind))
            }
            FilterExpr::Unary { op, operand } => {
                let (operand, kind) = self.bind_expr(operand, owner)?;
                let operand = Box::new(operand);
                match op {
                    UnaryOp::Not if kind.is_boolean() => {
                        Ok((BoundExpr::Not { operand }, ValueKind::Boolean))
                    }
                    UnaryOp::Neg if kind.is_numeric() => {
                        Ok((BoundExpr::Negate { operand }, ValueKind::Number))
                    }
                    _ => Err(InvalidQueryError::UnsupportedOperator {
                        operator: match op {
                            UnaryOp::Not => "not".to_string(),
                            UnaryOp::Neg => "-".to_string(),
                        },
                        kind,
                    }),
                }
            }
            FilterExpr::Binary { op, left, right } => self.bind_binary(*op, left, right, owner),
            FilterExpr::Call { name, args } => self.bind_call(name, args, owner),
        }
    }

    fn bind_binary(
        &self,
        op: BinaryOp,
        left: &FilterExpr,
        right: &FilterExpr,
        owner: &EntityTypeDescriptor,
    ) -> Result<(BoundExpr, ValueKind), InvalidQueryError> {
        let (l, lk) = self.bind_expr(left, owner)?;
        let (r, rk) = self.bind_expr(right, owner)?;
        let mismatch = || InvalidQueryError::TypeMismatch {
            operator: op.keyword().to_string(),
            left: lk,
            right: rk,
        };

        match op {
            BinaryOp::And | BinaryOp::Or => {
                if !(lk.is_boolean() && rk.is_boolean()) {
                    return Err(mismatch());
                }
                Ok((
                    BoundExpr::Logical {
                        op,
                        left: Box::new(l),
                        right: Box::new(r),
                    },
                    ValueKind::Boolean,
                ))
            }
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                if !(lk.is_numeric() && rk.is_numeric()) {
                    return Err(mismatch());
                }
                if matches!(op, BinaryOp::Div | BinaryOp::Mod)
                    && right.is_constant()
                    && eval::evaluate_constant(&r).and_then(|v| v.as_f64()) == Some(0.0)
                {
                    return Err(InvalidQueryError::DivisionByZero);
                }
                Ok((
                    BoundExpr::Arithmetic {
                        op,
                        left: Box::new(l),
                        right: Box::new(r),
                    },
                    ValueKind::Number,
                ))
            }
            BinaryOp::Eq
            | BinaryOp::Ne
            | BinaryOp::Lt
            | BinaryOp::Le
            | BinaryOp::Gt
            | BinaryOp::Ge => {
                let (l, lk) = coerce_literal(l, lk, rk)?;
                let (r, rk) = coerce_literal(r, rk, lk)?;
                let mode = match compare_mode(op, lk, rk)? {
                    CompareMode::Dynamic if is_id(&l) || is_id(&r) => CompareMode::Id,
                    mode => mode,
                };
                Ok((
                    BoundExpr::Compare {
                        op,
                        mode,
                        left: Box::new(l),
                        right: Box::new(r),
                    },
                    ValueKind::Boolean,
                ))
            }
        }
    }

    fn bind_call(
        &self,
        name: &str,
        args: &[FilterExpr],
        owner: &EntityTypeDescriptor,
    ) -> Result<(BoundExpr, ValueKind), InvalidQueryError> {
        let function = Function::from_name(name)
            .ok_or_else(|| InvalidQueryError::UnknownFunction(name.to_string()))?;
        let params = function.params();
        if args.len() < function.min_args() || args.len() > params.len() {
            let expected = if function.min_args() == params.len() {
                params.len().to_string()
            } else {
                format!("{} to {}", function.min_args(), params.len())
            };
            return Err(InvalidQueryError::Arity {
                function: function.name().to_string(),
                expected,
                found: args.len(),
            });
        }

        let mut bound = Vec::with_capacity(args.len());
        for (i, (arg, &param)) in args.iter().zip(params).enumerate() {
            let (b, kind) = self.bind_expr(arg, owner)?;
            let (b, kind) = coerce_literal(b, kind, param)?;
            if !Function::accepts(param, kind) {
                return Err(InvalidQueryError::ArgumentType {
                    function: function.name().to_string(),
                    position: i + 1,
                    expected: param,
                    found: kind,
                });
            }
            bound.push(b);
        }
        Ok((
            BoundExpr::Call {
                function,
                args: bound,
            },
            function.result(),
        ))
    }

    /// Walks `Datastream/Thing/name` style paths. Only to-one navigation is
    /// allowed before the property; anything after a JSON property is a key
    /// path into its value.
    fn bind_property(
        &self,
        path: &[String],
        owner: &EntityTypeDescriptor,
    ) -> Result<PropertyRef, InvalidQueryError> {
        let mut current = owner;
        let mut navigation = Vec::new();
        for (i, name) in path.iter().enumerate() {
            let last = i + 1 == path.len();
            if let Some(kind) = current.property(name) {
                if last || matches!(kind, PropertyKind::Json | PropertyKind::Any) {
                    return Ok(PropertyRef {
                        navigation,
                        property: name.clone(),
                        kind,
                        json_path: path[i + 1..].to_vec(),
                    });
                }
                return Err(InvalidQueryError::NotNavigable {
                    entity_type: current.name.clone(),
                    property: name.clone(),
                });
            }

            let edge = self
                .model
                .resolve_relation(&current.name, name)
                .map_err(|_| InvalidQueryError::UnknownProperty {
                    entity_type: current.name.clone(),
                    property: name.clone(),
                })?;
            if edge.multiplicity == Multiplicity::Many {
                return Err(InvalidQueryError::ToManyNavigation {
                    entity_type: current.name.clone(),
                    navigation: name.clone(),
                });
            }
            if last {
                return Err(InvalidQueryError::NavigationIsNotAValue {
                    entity_type: current.name.clone(),
                    navigation: name.clone(),
                });
            }
            current = self
                .model
                .describe(&edge.target)
                .map_err(|_| InvalidQueryError::UnknownEntityType(edge.target.clone()))?;
            navigation.push(name.clone());
        }
        Err(InvalidQueryError::UnknownProperty {
            entity_type: owner.name.clone(),
            property: String::new(),
        })
    }
}

fn is_id(expr: &BoundExpr) -> bool {
    matches!(
        expr,
        BoundExpr::Property(PropertyRef { kind: PropertyKind::Id, json_path, .. }) if json_path.is_empty()
    )
}

/// Reads a text literal as the time or geometry value its counterpart
/// expects, e.g. `phenomenonTime gt '2020-01-01T00:00:00Z'`.
fn coerce_literal(
    expr: BoundExpr,
    kind: ValueKind,
    target: ValueKind,
) -> Result<(BoundExpr, ValueKind), InvalidQueryError> {
    let BoundExpr::Literal {
        value: Value::Text(text),
    } = &expr
    else {
        return Ok((expr, kind));
    };
    let value = match target {
        ValueKind::Instant => parse_instant(text).map(Value::Instant),
        ValueKind::Period | ValueKind::TimeValue => parse_time_value(text),
        ValueKind::Geometry => geometry::Geometry::parse_wkt(text).map(Value::Geometry),
        _ => return Ok((expr, kind)),
    };
    let value = value.ok_or_else(|| InvalidQueryError::InvalidLiteral {
        expected: target,
        literal: text.clone(),
    })?;
    let kind = ValueKind::of_value(&value);
    Ok((BoundExpr::Literal { value }, kind))
}

fn compare_mode(
    op: BinaryOp,
    left: ValueKind,
    right: ValueKind,
) -> Result<CompareMode, InvalidQueryError> {
    use ValueKind::*;
    let equality = matches!(op, BinaryOp::Eq | BinaryOp::Ne);
    let unsupported = |kind| InvalidQueryError::UnsupportedOperator {
        operator: op.keyword().to_string(),
        kind,
    };
    match (left, right) {
        (Null, _) | (_, Null) if equality => Ok(CompareMode::NullCheck),
        (Null, _) | (_, Null) => Err(unsupported(Null)),
        (Dynamic, _) | (_, Dynamic) => Ok(CompareMode::Dynamic),
        (Number, Number) => Ok(CompareMode::Numeric),
        (Text, Text) => Ok(CompareMode::Text),
        (Boolean, Boolean) if equality => Ok(CompareMode::Boolean),
        (Boolean, Boolean) => Err(unsupported(Boolean)),
        (Geometry, Geometry) if equality => Ok(CompareMode::Geometry),
        (Geometry, Geometry) => Err(unsupported(Geometry)),
        (Instant, Instant) => Ok(CompareMode::Instant),
        (Period, Period | Instant | TimeValue) | (Instant | TimeValue, Period) => {
            if equality {
                Ok(CompareMode::Period)
            } else {
                Err(InvalidQueryError::PeriodOrdering {
                    operator: op.keyword().to_string(),
                })
            }
        }
        (TimeValue, TimeValue | Instant) | (Instant, TimeValue) => Ok(CompareMode::TimeValue),
        _ => Err(InvalidQueryError::TypeMismatch {
            operator: op.keyword().to_string(),
            left,
            right,
        }),
    }
}
