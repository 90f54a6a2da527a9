use thiserror::Error;

/// A malformed or semantically inconsistent resource path.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvalidUrlError {
    #[error("invalid path `{path}` at offset {offset}: {message}")]
    Syntax {
        path: String,
        offset: usize,
        message: String,
    },
    #[error("invalid path `{path}`: unknown collection `{name}`")]
    UnknownCollection { path: String, name: String },
    #[error("invalid path `{path}`: `{name}` is neither a navigation nor a property of {entity_type}")]
    UnknownNavigation {
        path: String,
        entity_type: String,
        name: String,
    },
    #[error("invalid path `{path}`: `{name}` addresses a single entity and takes no identifier")]
    UnexpectedIdentifier { path: String, name: String },
    #[error("invalid path `{path}`: `{name}` is a set; an identifier is required to navigate further")]
    MissingIdentifier { path: String, name: String },
    #[error("invalid path `{path}`: property `{name}` must be the last path element")]
    PropertyNotTerminal { path: String, name: String },
    #[error("invalid path `{path}`: property `{name}` is addressed on a set, not on a single entity")]
    PropertyOfCollection { path: String, name: String },
    #[error("invalid path `{path}`: `{modifier}` is not allowed here")]
    MisplacedModifier { path: String, modifier: String },
    #[error("invalid path `{path}`: more than {max} segments")]
    TooManySegments { path: String, max: usize },
}

impl InvalidUrlError {
    pub fn syntax(path: &str, offset: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            path: path.to_string(),
            offset,
            message: message.into(),
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Self::Syntax { path, .. }
            | Self::UnknownCollection { path, .. }
            | Self::UnknownNavigation { path, .. }
            | Self::UnexpectedIdentifier { path, .. }
            | Self::MissingIdentifier { path, .. }
            | Self::PropertyNotTerminal { path, .. }
            | Self::PropertyOfCollection { path, .. }
            | Self::MisplacedModifier { path, .. }
            | Self::TooManySegments { path, .. } => path,
        }
    }

    /// Re-anchor a syntax error found in a suffix of `original` that starts at `shift`.
    pub(crate) fn within(self, original: &str, shift: usize) -> Self {
        match self {
            Self::Syntax {
                offset, message, ..
            } => Self::Syntax {
                path: original.to_string(),
                offset: offset + shift,
                message,
            },
            other => other,
        }
    }
}
