//! Entity types, navigation edges and the immutable [`EntityModel`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

// ============================================================================
// Descriptors
// ============================================================================

/// Cardinality of a navigation role, seen from its source type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Multiplicity {
    One,
    Many,
}

/// Value kind of an addressable property.
///
/// `Any` and `Json` are dynamically typed: filters over them are checked when
/// evaluated, not when bound.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKind {
    Id,
    Text,
    Number,
    Boolean,
    Instant,
    Period,
    /// Either an instant or a period, decided per value.
    TimeValue,
    Geometry,
    Json,
    Any,
}

impl PropertyKind {
    pub fn is_dynamic(self) -> bool {
        matches!(self, PropertyKind::Any | PropertyKind::Json | PropertyKind::Id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntityTypeDescriptor {
    /// Singular type name, e.g. `Datastream`.
    pub name: String,
    /// Plural collection name, e.g. `Datastreams`.
    pub collection: String,
    /// Whether the collection is addressable at the service root.
    pub root: bool,
    pub properties: BTreeMap<String, PropertyKind>,
}

impl EntityTypeDescriptor {
    pub fn new(name: impl Into<String>, collection: impl Into<String>) -> Self {
        let mut properties = BTreeMap::new();
        properties.insert("id".to_string(), PropertyKind::Id);
        Self {
            name: name.into(),
            collection: collection.into(),
            root: true,
            properties,
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, kind: PropertyKind) -> Self {
        self.properties.insert(name.into(), kind);
        self
    }

    /// Hides the collection from the service root; it stays reachable by navigation.
    pub fn nested(mut self) -> Self {
        self.root = false;
        self
    }

    pub fn property(&self, name: &str) -> Option<PropertyKind> {
        self.properties.get(name).copied()
    }
}

/// One row of the navigation adjacency table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelationEdge {
    pub source: String,
    pub role: String,
    pub target: String,
    /// Collection label a resolved path segment carries for this navigation.
    pub target_collection: String,
    pub multiplicity: Multiplicity,
    /// Role on `target` that navigates back to `source`.
    pub inverse: String,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unknown entity type `{0}`")]
    UnknownEntityType(String),
    #[error("entity type `{entity_type}` has no navigation `{role}`")]
    UnknownRelation { entity_type: String, role: String },
    #[error("entity type `{entity_type}` has no property `{property}`")]
    UnknownProperty {
        entity_type: String,
        property: String,
    },
    #[error("duplicate entity type or collection name `{0}`")]
    DuplicateName(String),
    #[error("duplicate navigation `{role}` on `{entity_type}`")]
    DuplicateRelation { entity_type: String, role: String },
    #[error("navigation `{role}` on `{entity_type}` clashes with a property of the same name")]
    RoleShadowsProperty { entity_type: String, role: String },
    #[error(
        "navigation `{role}` on `{entity_type}` declares inverse `{inverse}`, which does not navigate back"
    )]
    BrokenInverse {
        entity_type: String,
        role: String,
        inverse: String,
    },
}

// ============================================================================
// Model
// ============================================================================

/// Immutable entity model: type descriptors plus the navigation table.
#[derive(Debug, Clone)]
pub struct EntityModel {
    types: BTreeMap<String, EntityTypeDescriptor>,
    by_collection: HashMap<String, String>,
    relations: HashMap<(String, String), RelationEdge>,
}

impl EntityModel {
    pub fn builder() -> EntityModelBuilder {
        EntityModelBuilder::default()
    }

    /// Look up a type by singular name or by collection name.
    pub fn describe(&self, name: &str) -> Result<&EntityTypeDescriptor, RegistryError> {
        if let Some(desc) = self.types.get(name) {
            return Ok(desc);
        }
        self.by_collection
            .get(name)
            .and_then(|type_name| self.types.get(type_name))
            .ok_or_else(|| RegistryError::UnknownEntityType(name.to_string()))
    }

    /// Root collection lookup: `Things` → `Thing`.
    pub fn root_collection(&self, collection: &str) -> Option<&EntityTypeDescriptor> {
        self.by_collection
            .get(collection)
            .and_then(|type_name| self.types.get(type_name))
            .filter(|desc| desc.root)
    }

    pub fn resolve_relation(
        &self,
        entity_type: &str,
        role: &str,
    ) -> Result<&RelationEdge, RegistryError> {
        self.relations
            .get(&(entity_type.to_string(), role.to_string()))
            .ok_or_else(|| RegistryError::UnknownRelation {
                entity_type: entity_type.to_string(),
                role: role.to_string(),
            })
    }

    pub fn resolve_property(
        &self,
        entity_type: &str,
        property: &str,
    ) -> Result<PropertyKind, RegistryError> {
        self.describe(entity_type)?
            .property(property)
            .ok_or_else(|| RegistryError::UnknownProperty {
                entity_type: entity_type.to_string(),
                property: property.to_string(),
            })
    }

    pub fn types(&self) -> impl Iterator<Item = &EntityTypeDescriptor> {
        self.types.values()
    }

    /// All navigation edges leaving `entity_type`, sorted by role name.
    pub fn relations_of(&self, entity_type: &str) -> Vec<&RelationEdge> {
        let mut edges: Vec<&RelationEdge> = self
            .relations
            .values()
            .filter(|edge| edge.source == entity_type)
            .collect();
        edges.sort_by(|a, b| a.role.cmp(&b.role));
        edges
    }

    /// Every navigation edge, sorted by `(source, role)`.
    pub fn relations(&self) -> Vec<&RelationEdge> {
        let mut edges: Vec<&RelationEdge> = self.relations.values().collect();
        edges.sort_by(|a, b| (&a.source, &a.role).cmp(&(&b.source, &b.role)));
        edges
    }
}

// ============================================================================
// Builder
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct EntityModelBuilder {
    types: Vec<EntityTypeDescriptor>,
    relations: Vec<RelationEdge>,
    property_overrides: Vec<(String, String, PropertyKind)>,
}

impl EntityModelBuilder {
    pub fn entity_type(mut self, descriptor: EntityTypeDescriptor) -> Self {
        self.types.push(descriptor);
        self
    }

    /// Declare a navigation whose segment label is the target's collection name.
    pub fn relation(
        self,
        source: &str,
        role: &str,
        target: &str,
        multiplicity: Multiplicity,
        inverse: &str,
    ) -> Self {
        self.relation_labelled(source, role, target, multiplicity, inverse, None)
    }

    /// Declare a navigation with an explicit segment label (e.g. `Subject` → `Subjects`).
    pub fn relation_labelled(
        mut self,
        source: &str,
        role: &str,
        target: &str,
        multiplicity: Multiplicity,
        inverse: &str,
        label: Option<&str>,
    ) -> Self {
        self.relations.push(RelationEdge {
            source: source.to_string(),
            role: role.to_string(),
            target: target.to_string(),
            // Filled from the target descriptor in `build` when unlabelled.
            target_collection: label.unwrap_or_default().to_string(),
            multiplicity,
            inverse: inverse.to_string(),
        });
        self
    }

    /// Add or re-declare a property on an already declared type.
    pub fn property(mut self, entity_type: &str, property: &str, kind: PropertyKind) -> Self {
        self.property_overrides
            .push((entity_type.to_string(), property.to_string(), kind));
        self
    }

    pub fn build(self) -> Result<EntityModel, RegistryError> {
        let mut types: BTreeMap<String, EntityTypeDescriptor> = BTreeMap::new();
        let mut by_collection: HashMap<String, String> = HashMap::new();

        for desc in self.types {
            if types.contains_key(&desc.name) || by_collection.contains_key(&desc.collection) {
                return Err(RegistryError::DuplicateName(desc.name));
            }
            by_collection.insert(desc.collection.clone(), desc.name.clone());
            types.insert(desc.name.clone(), desc);
        }

        for (entity_type, property, kind) in self.property_overrides {
            let desc = types
                .get_mut(&entity_type)
                .ok_or_else(|| RegistryError::UnknownEntityType(entity_type.clone()))?;
            desc.properties.insert(property, kind);
        }

        let mut relations: HashMap<(String, String), RelationEdge> = HashMap::new();
        for mut edge in self.relations {
            let source = types
                .get(&edge.source)
                .ok_or_else(|| RegistryError::UnknownEntityType(edge.source.clone()))?;
            let target = types
                .get(&edge.target)
                .ok_or_else(|| RegistryError::UnknownEntityType(edge.target.clone()))?;
            if source.properties.contains_key(&edge.role) {
                return Err(RegistryError::RoleShadowsProperty {
                    entity_type: edge.source,
                    role: edge.role,
                });
            }
            if edge.target_collection.is_empty() {
                edge.target_collection = target.collection.clone();
            }
            let key = (edge.source.clone(), edge.role.clone());
            if relations.contains_key(&key) {
                return Err(RegistryError::DuplicateRelation {
                    entity_type: edge.source,
                    role: edge.role,
                });
            }
            relations.insert(key, edge);
        }

        for edge in relations.values() {
            let back = relations.get(&(edge.target.clone(), edge.inverse.clone()));
            let consistent = back.is_some_and(|back| {
                back.target == edge.source && back.inverse == edge.role
            });
            if !consistent {
                return Err(RegistryError::BrokenInverse {
                    entity_type: edge.source.clone(),
                    role: edge.role.clone(),
                    inverse: edge.inverse.clone(),
                });
            }
        }

        Ok(EntityModel {
            types,
            by_collection,
            relations,
        })
    }
}
