use thiserror::Error;

use crate::binder::ValueKind;

/// Malformed filter text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvalidFilterExpressionError {
    #[error("filter expression is empty")]
    Empty,
    #[error("invalid filter at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },
    #[error("filter nesting exceeds {max} levels")]
    TooDeep { max: usize },
}

/// A well-formed filter that cannot be bound to the requested entity type.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvalidQueryError {
    #[error("unknown entity type `{0}`")]
    UnknownEntityType(String),
    #[error("{entity_type} has no property `{property}`")]
    UnknownProperty {
        entity_type: String,
        property: String,
    },
    #[error("`{navigation}` of {entity_type} leads to a set and cannot be used as a value path")]
    ToManyNavigation {
        entity_type: String,
        navigation: String,
    },
    #[error("`{navigation}` of {entity_type} is an entity, not a value")]
    NavigationIsNotAValue {
        entity_type: String,
        navigation: String,
    },
    #[error("property `{property}` of {entity_type} has no sub-properties")]
    NotNavigable {
        entity_type: String,
        property: String,
    },
    #[error("`{operator}` cannot combine {left} and {right}")]
    TypeMismatch {
        operator: String,
        left: ValueKind,
        right: ValueKind,
    },
    #[error("`{operator}` is not defined for {kind}")]
    UnsupportedOperator { operator: String, kind: ValueKind },
    #[error("`{operator}` cannot order a time period; only `eq` and `ne` apply")]
    PeriodOrdering { operator: String },
    #[error("division by zero")]
    DivisionByZero,
    #[error("unknown function `{0}`")]
    UnknownFunction(String),
    #[error("`{function}` expects {expected} arguments, got {found}")]
    Arity {
        function: String,
        expected: String,
        found: usize,
    },
    #[error("argument {position} of `{function}` must be {expected}, got {found}")]
    ArgumentType {
        function: String,
        position: usize,
        expected: ValueKind,
        found: ValueKind,
    },
    #[error("`{literal}` is not a valid {expected} literal")]
    InvalidLiteral { expected: ValueKind, literal: String },
    #[error("a filter must be a boolean condition, got {0}")]
    NotBoolean(ValueKind),
    #[error("cannot combine predicates over {left} and {right}")]
    EntityTypeMismatch { left: String, right: String },
}

/// Either failure of [`crate::FilterTranslator::translate`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error(transparent)]
    Expression(#[from] InvalidFilterExpressionError),
    #[error(transparent)]
    Query(#[from] InvalidQueryError),
}
