//! `$filter` translation.
//!
//! ```text
//! "result mod 2 eq 0"
//!   → parse  → FilterExpr   (syntax only; InvalidFilterExpressionError)
//!   → bind   → Predicate    (checked against an entity type; InvalidQueryError)
//!   → evaluate(&entity) → bool
//! ```
//!
//! Binding fixes comparison semantics per value kind: numbers compare
//! numerically, text ordinally, instants chronologically, and time periods
//! only support `eq`/`ne`, where an instant equals a period it falls inside.
//! Properties without a static kind (`Observation/result`, JSON properties)
//! are checked when evaluated; a mismatch there makes the condition unknown,
//! which never matches.

pub mod binder;
pub mod error;
pub mod eval;
pub mod expr;
pub mod function;
pub mod geometry;
pub mod parser;
pub mod settings;
pub mod translator;
pub mod value;

pub use binder::{Binder, BoundExpr, CompareMode, PropertyRef, ValueKind};
pub use error::{FilterError, InvalidFilterExpressionError, InvalidQueryError};
pub use eval::{EntitySnapshot, Filterable};
pub use expr::{BinaryOp, FilterExpr, UnaryOp};
pub use function::Function;
pub use geometry::Geometry;
pub use parser::{parse_filter, parse_filter_with};
pub use settings::FilterSettings;
pub use translator::{FilterTranslator, Predicate};
pub use value::{TimeInterval, Value};
