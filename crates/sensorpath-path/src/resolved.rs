//! Typed output of path resolution.

use sensorpath_model::Multiplicity;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PathType {
    /// The path denotes a set of entities.
    Collection,
    /// The path denotes exactly one entity.
    Entity,
    /// The path denotes one property of one entity.
    Property,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PathModifier {
    /// `$ref`: entity references instead of entities.
    Ref,
    /// `$value`: the raw value of a property.
    Value,
}

impl PathModifier {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ref" => Some(Self::Ref),
            "value" => Some(Self::Value),
            _ => None,
        }
    }
}

impl fmt::Display for PathModifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathModifier::Ref => write!(f, "$ref"),
            PathModifier::Value => write!(f, "$value"),
        }
    }
}

/// One navigation step of a resolved path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct PathSegment {
    /// Collection label of the step; for relabelled roles this differs from
    /// the target type's collection (`Subject` → `Subjects`).
    pub collection_name: String,
    /// The name as written in the path.
    pub navigation: String,
    /// Singular name of the entity type this step lands on.
    pub entity_type: String,
    pub identifier: Option<String>,
    /// Only ever set on the first (most specific) segment.
    pub property_name: Option<String>,
    pub multiplicity: Multiplicity,
}

impl PathSegment {
    /// Whether this step lands on a single entity rather than a set.
    pub fn addresses_entity(&self) -> bool {
        self.identifier.is_some() || self.multiplicity == Multiplicity::One
    }
}

/// A resolved path, most specific segment first.
///
/// `/Groups(sdf)/Relations` resolves to `[Relations, Groups(sdf)]`: consumers
/// index from the addressed resource outward.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ResolvedPath {
    segments: Vec<PathSegment>,
    path_type: PathType,
    modifier: Option<PathModifier>,
}

impl ResolvedPath {
    /// `segments` must be non-empty and ordered most specific first.
    pub(crate) fn new(
        segments: Vec<PathSegment>,
        path_type: PathType,
        modifier: Option<PathModifier>,
    ) -> Self {
        debug_assert!(!segments.is_empty());
        Self {
            segments,
            path_type,
            modifier,
        }
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn path_type(&self) -> PathType {
        self.path_type
    }

    pub fn modifier(&self) -> Option<PathModifier> {
        self.modifier
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The addressed segment (the rightmost path element).
    pub fn main(&self) -> &PathSegment {
        &self.segments[0]
    }

    /// The segment the addressed one was navigated from, if any.
    pub fn parent(&self) -> Option<&PathSegment> {
        self.segments.get(1)
    }

    /// Entity type of the addressed resource.
    pub fn entity_type(&self) -> &str {
        &self.main().entity_type
    }

    pub fn property_name(&self) -> Option<&str> {
        self.main().property_name.as_deref()
    }
}

/// Canonical form: `/Outer(id)/Nav/property[/$modifier]`.
impl fmt::Display for ResolvedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in self.segments.iter().rev() {
            write!(f, "/{}", segment.navigation)?;
            if let Some(id) = &segment.identifier {
                write!(f, "({})", format_identifier(id))?;
            }
            if let Some(property) = &segment.property_name {
                write!(f, "/{property}")?;
            }
        }
        if let Some(modifier) = self.modifier {
            write!(f, "/{modifier}")?;
        }
        Ok(())
    }
}

/// Identifiers are written raw when that is unambiguous, quoted otherwise.
pub fn format_identifier(id: &str) -> String {
    let plain = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':' | '~'));
    if plain {
        id.to_string()
    } else {
        format!("'{}'", id.replace('\'', "''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_quoting() {
        assert_eq!(format_identifier("42"), "42");
        assert_eq!(format_identifier("sdf"), "sdf");
        assert_eq!(format_identifier("a b"), "'a b'");
        assert_eq!(format_identifier("it's"), "'it''s'");
        assert_eq!(format_identifier("x(1)"), "'x(1)'");
    }
}
