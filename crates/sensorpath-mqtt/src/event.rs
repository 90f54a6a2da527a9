use sensorpath_filter::EntitySnapshot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// `(entity type, id)` of a stored entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    pub entity_type: String,
    pub id: String,
}

impl EntityRef {
    pub fn new(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }
}

/// An entity the changed entity is linked to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedEntity {
    pub entity_type: String,
    pub id: String,
    /// Navigation role from the changed entity to this one (`Thing` for a
    /// Datastream's thing), when the event source knows it.
    #[serde(default)]
    pub role: Option<String>,
}

/// A created or updated entity, as reported by the storage layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub entity: EntitySnapshot,
    #[serde(default)]
    pub related: Vec<RelatedEntity>,
    /// Changed property names; `None` for a newly created entity.
    #[serde(default)]
    pub changed_properties: Option<BTreeSet<String>>,
}

impl ChangeEvent {
    pub fn created(entity: EntitySnapshot) -> Self {
        Self {
            entity,
            related: Vec::new(),
            changed_properties: None,
        }
    }

    pub fn updated<I, S>(entity: EntitySnapshot, changed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entity,
            related: Vec::new(),
            changed_properties: Some(changed.into_iter().map(Into::into).collect()),
        }
    }

    pub fn with_related(mut self, entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        self.related.push(RelatedEntity {
            entity_type: entity_type.into(),
            id: id.into(),
            role: None,
        });
        self
    }

    pub fn with_related_role(
        mut self,
        entity_type: impl Into<String>,
        id: impl Into<String>,
        role: impl Into<String>,
    ) -> Self {
        self.related.push(RelatedEntity {
            entity_type: entity_type.into(),
            id: id.into(),
            role: Some(role.into()),
        });
        self
    }

    pub fn entity_type(&self) -> &str {
        &self.entity.entity_type
    }

    pub fn id(&self) -> &str {
        &self.entity.id
    }

    /// Whether `source` is among the related entities, reached through
    /// `role` when the entry names one.
    pub fn is_related_to(&self, source: &EntityRef, role: Option<&str>) -> bool {
        self.related.iter().any(|r| {
            r.entity_type == source.entity_type
                && r.id == source.id
                && match (&r.role, role) {
                    (Some(actual), Some(expected)) => actual == expected,
                    _ => true,
                }
        })
    }

    /// Whether `property` changed; every property counts for a creation.
    pub fn touches(&self, property: &str) -> bool {
        self.changed_properties
            .as_ref()
            .map_or(true, |changed| changed.contains(property))
    }
}
