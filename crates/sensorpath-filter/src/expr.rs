//! Parsed, unbound filter syntax tree.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
}

impl BinaryOp {
    pub fn keyword(self) -> &'static str {
        match self {
            BinaryOp::Eq => "eq",
            BinaryOp::Ne => "ne",
            BinaryOp::Lt => "lt",
            BinaryOp::Le => "le",
            BinaryOp::Gt => "gt",
            BinaryOp::Ge => "ge",
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
            BinaryOp::Mod => "mod",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum FilterExpr {
    Literal {
        value: Value,
    },
    /// Slash-separated property path, e.g. `Datastream/name`.
    Property {
        path: Vec<String>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<FilterExpr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<FilterExpr>,
        right: Box<FilterExpr>,
    },
    Call {
        name: String,
        args: Vec<FilterExpr>,
    },
}

impl FilterExpr {
    pub fn literal(value: Value) -> Self {
        FilterExpr::Literal { value }
    }

    pub fn property<S: Into<String>>(path: impl IntoIterator<Item = S>) -> Self {
        FilterExpr::Property {
            path: path.into_iter().map(Into::into).collect(),
        }
    }

    pub fn unary(op: UnaryOp, operand: FilterExpr) -> Self {
        FilterExpr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn binary(op: BinaryOp, left: FilterExpr, right: FilterExpr) -> Self {
        FilterExpr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Height of the tree; a lone literal or property has depth 1.
    pub fn depth(&self) -> usize {
        match self {
            FilterExpr::Literal { .. } | FilterExpr::Property { .. } => 1,
            FilterExpr::Unary { operand, .. } => 1 + operand.depth(),
            FilterExpr::Binary { left, right, .. } => 1 + left.depth().max(right.depth()),
            FilterExpr::Call { args, .. } => 1 + args.iter().map(Self::depth).max().unwrap_or(0),
        }
    }

    /// True when no property is referenced, so the value is fixed at bind time.
    pub fn is_constant(&self) -> bool {
        match self {
            FilterExpr::Literal { .. } => true,
            FilterExpr::Property { .. } => false,
            FilterExpr::Unary { operand, .. } => operand.is_constant(),
            FilterExpr::Binary { left, right, .. } => left.is_constant() && right.is_constant(),
            // `now()` is not constant.
            FilterExpr::Call { name, args } => {
                !name.eq_ignore_ascii_case("now") && args.iter().all(Self::is_constant)
            }
        }
    }
}

impl fmt::Display for FilterExpr {
    /// Fully parenthesised; parses back to an equal tree.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterExpr::Literal { value } => write!(f, "{value}"),
            FilterExpr::Property { path } => f.write_str(&path.join("/")),
            FilterExpr::Unary {
                op: UnaryOp::Not,
                operand,
            } => write!(f, "(not {operand})"),
            FilterExpr::Unary {
                op: UnaryOp::Neg,
                operand,
            } => write!(f, "(- {operand})"),
            FilterExpr::Binary { op, left, right } => {
                write!(f, "({left} {} {right})", op.keyword())
            }
            FilterExpr::Call { name, args } => {
                write!(f, "{name}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
        }
    }
}
