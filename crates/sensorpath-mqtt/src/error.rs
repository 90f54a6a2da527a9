use sensorpath_filter::{InvalidFilterExpressionError, InvalidQueryError};
use sensorpath_path::InvalidUrlError;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SubscriptionError {
    #[error(transparent)]
    Url(#[from] InvalidUrlError),
    #[error(transparent)]
    Expression(#[from] InvalidFilterExpressionError),
    #[error(transparent)]
    Query(#[from] InvalidQueryError),
    #[error("`$filter` is only allowed on collection topics, not `{topic}`")]
    FilterNotAllowed { topic: String },
    #[error("property topics are disabled: `{topic}`")]
    PropertyTopicsDisabled { topic: String },
    #[error("topic `{topic}` ends in a path modifier and cannot be subscribed to")]
    ModifierNotAllowed { topic: String },
    #[error("unsupported query option `{option}` in topic `{topic}`")]
    UnsupportedOption { topic: String, option: String },
    #[error("topic `{topic}` navigates from an entity without an identifier")]
    SourceNotIdentified { topic: String },
}
