//! SensorThings entity model registry.
//!
//! The registry is the single source of truth for what a resource path or a
//! filter expression may mention:
//!
//! - entity types, each with a singular name (`Thing`) and the plural
//!   collection name it is addressed by at the service root (`Things`),
//! - navigation roles between entity types, stored as one adjacency table keyed
//!   by `(source type, role name)`,
//! - addressable properties and their value kinds.
//!
//! Role names do not have to match collection names. A `Relation` reaches its
//! subject observation through the `Subject` role, and the resolved segment is
//! labelled `Subjects` rather than `Observations`. That relabelling lives in the
//! table (`RelationEdge::target_collection`), never in the resolver.
//!
//! A model is built once (usually [`EntityModel::sensor_things`]) and shared
//! read-only behind an `Arc` by the resolver, the filter translator and the
//! subscription matcher.

pub mod registry;
pub mod sensor_things;

pub use registry::{
    EntityModel, EntityModelBuilder, EntityTypeDescriptor, Multiplicity, PropertyKind,
    RegistryError, RelationEdge,
};
