//! The OGC SensorThings core model plus the STAplus extension types
//! (`Groups`, `Relations`, `Licenses`, `Projects`, `Parties`).

use crate::registry::{
    EntityModel, EntityModelBuilder, EntityTypeDescriptor, Multiplicity, PropertyKind,
    RegistryError,
};

use Multiplicity::{Many, One};
use PropertyKind::*;

impl EntityModel {
    /// The standard SensorThings + STAplus registry.
    pub fn sensor_things() -> Result<Self, RegistryError> {
        Self::sensor_things_builder().build()
    }

    /// The standard registry as a builder, for deployments that re-declare
    /// property kinds or add types before freezing the model.
    pub fn sensor_things_builder() -> EntityModelBuilder {
        let builder = EntityModel::builder()
            .entity_type(
                named("Thing", "Things").with_property("properties", Json),
            )
            .entity_type(
                named("Location", "Locations")
                    .with_property("encodingType", Text)
                    .with_property("location", Geometry)
                    .with_property("properties", Json),
            )
            .entity_type(
                EntityTypeDescriptor::new("HistoricalLocation", "HistoricalLocations")
                    .with_property("time", Instant),
            )
            .entity_type(
                named("Datastream", "Datastreams")
                    .with_property("observationType", Text)
                    .with_property("unitOfMeasurement", Json)
                    .with_property("observedArea", Geometry)
                    .with_property("phenomenonTime", Period)
                    .with_property("resultTime", Period)
                    .with_property("properties", Json),
            )
            .entity_type(
                named("Sensor", "Sensors")
                    .with_property("encodingType", Text)
                    .with_property("metadata", Any)
                    .with_property("properties", Json),
            )
            .entity_type(
                named("ObservedProperty", "ObservedProperties")
                    .with_property("definition", Text)
                    .with_property("properties", Json),
            )
            .entity_type(
                EntityTypeDescriptor::new("Observation", "Observations")
                    .with_property("phenomenonTime", TimeValue)
                    .with_property("resultTime", Instant)
                    .with_property("result", Any)
                    .with_property("resultQuality", Any)
                    .with_property("validTime", Period)
                    .with_property("parameters", Json),
            )
            .entity_type(
                named("FeatureOfInterest", "FeaturesOfInterest")
                    .with_property("encodingType", Text)
                    .with_property("feature", Geometry)
                    .with_property("properties", Json),
            )
            .entity_type(
                named("Group", "Groups")
                    .with_property("purpose", Text)
                    .with_property("creationTime", Instant)
                    .with_property("endTime", Instant)
                    .with_property("properties", Json),
            )
            .entity_type(
                EntityTypeDescriptor::new("Relation", "Relations")
                    .with_property("role", Text)
                    .with_property("description", Text)
                    .with_property("externalObject", Text)
                    .with_property("properties", Json),
            )
            .entity_type(
                named("License", "Licenses")
                    .with_property("definition", Text)
                    .with_property("logo", Text)
                    .with_property("attributionText", Text)
                    .with_property("properties", Json),
            )
            .entity_type(
                named("Project", "Projects")
                    .with_property("classification", Text)
                    .with_property("termsOfUse", Text)
                    .with_property("privacyPolicy", Text)
                    .with_property("creationTime", Instant)
                    .with_property("startTime", Instant)
                    .with_property("endTime", Instant)
                    .with_property("url", Text)
                    .with_property("properties", Json),
            )
            .entity_type(
                EntityTypeDescriptor::new("Party", "Parties")
                    .with_property("authId", Text)
                    .with_property("displayName", Text)
                    .with_property("description", Text)
                    .with_property("role", Text)
                    .with_property("properties", Json),
            );

        // Core SensorThings navigation.
        let builder = pair(builder, ("Thing", "Locations", Many), ("Location", "Things", Many));
        let builder = pair(
            builder,
            ("Thing", "HistoricalLocations", Many),
            ("HistoricalLocation", "Thing", One),
        );
        let builder = pair(
            builder,
            ("Location", "HistoricalLocations", Many),
            ("HistoricalLocation", "Locations", Many),
        );
        let builder = pair(builder, ("Thing", "Datastreams", Many), ("Datastream", "Thing", One));
        let builder = pair(builder, ("Sensor", "Datastreams", Many), ("Datastream", "Sensor", One));
        let builder = pair(
            builder,
            ("ObservedProperty", "Datastreams", Many),
            ("Datastream", "ObservedProperty", One),
        );
        let builder = pair(
            builder,
            ("Datastream", "Observations", Many),
            ("Observation", "Datastream", One),
        );
        let builder = pair(
            builder,
            ("FeatureOfInterest", "Observations", Many),
            ("Observation", "FeatureOfInterest", One),
        );

        // STAplus.
        let builder = pair(builder, ("Party", "Things", Many), ("Thing", "Party", One));
        let builder = pair(builder, ("Party", "Datastreams", Many), ("Datastream", "Party", One));
        let builder = pair(builder, ("Party", "Groups", Many), ("Group", "Party", One));
        let builder = pair(builder, ("Project", "Datastreams", Many), ("Datastream", "Project", One));
        let builder = pair(builder, ("License", "Datastreams", Many), ("Datastream", "License", One));
        let builder = pair(builder, ("License", "Groups", Many), ("Group", "License", One));
        let builder = pair(builder, ("License", "Projects", Many), ("Project", "License", One));
        let builder = pair(builder, ("Group", "Observations", Many), ("Observation", "Groups", Many));
        let builder = pair(builder, ("Group", "Relations", Many), ("Relation", "Groups", Many));
        let builder = pair(builder, ("Group", "Projects", Many), ("Project", "Groups", Many));

        // A Relation links two observations; the roles are relabelled so a
        // resolved path keeps the perspective it was navigated from.
        builder
            .relation_labelled("Relation", "Subject", "Observation", One, "Subjects", Some("Subjects"))
            .relation("Observation", "Subjects", "Relation", Many, "Subject")
            .relation_labelled("Relation", "Object", "Observation", One, "Objects", Some("Objects"))
            .relation("Observation", "Objects", "Relation", Many, "Object")
    }
}

fn named(name: &str, collection: &str) -> EntityTypeDescriptor {
    EntityTypeDescriptor::new(name, collection)
        .with_property("name", Text)
        .with_property("description", Text)
}

/// Declare a navigation and its inverse in one go.
fn pair(
    builder: EntityModelBuilder,
    (source, role, source_mult): (&str, &str, Multiplicity),
    (target, inverse, target_mult): (&str, &str, Multiplicity),
) -> EntityModelBuilder {
    builder
        .relation(source, role, target, source_mult, inverse)
        .relation(target, inverse, source, target_mult, role)
}
