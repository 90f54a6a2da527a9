//! End-to-end filter translation and evaluation over entity snapshots.

use approx::assert_relative_eq;
use proptest::prelude::*;
use sensorpath_filter::*;
use sensorpath_model::{EntityModel, PropertyKind};
use serde_json::json;
use std::sync::Arc;

fn translator() -> FilterTranslator {
    FilterTranslator::new(
        Arc::new(EntityModel::sensor_things().unwrap()),
        FilterSettings::default(),
    )
}

fn observation(id: &str, result: serde_json::Value) -> EntitySnapshot {
    EntitySnapshot::new("Observation", id).with_property("result", result)
}

fn check(entity_type: &str, filter: &str, entity: &EntitySnapshot) -> bool {
    translator()
        .translate(filter, entity_type)
        .unwrap_or_else(|e| panic!("{filter}: {e}"))
        .evaluate(entity)
}

// ============================================================================
// Arithmetic over dynamic results
// ============================================================================

#[test]
fn even_results() {
    let p = translator().translate("result mod 2 eq 0", "Observation").unwrap();
    assert!(p.evaluate(&observation("1", json!(4))));
    assert!(!p.evaluate(&observation("2", json!(3))));
    // Non-numeric results are unknown, never a match.
    assert!(!p.evaluate(&observation("3", json!("four"))));
    assert!(!p.evaluate(&EntitySnapshot::new("Observation", "4")));
}

#[test]
fn non_numeric_result_kind_rejects_arithmetic() {
    let model = EntityModel::sensor_things_builder()
        .property("Observation", "result", PropertyKind::Text)
        .build()
        .unwrap();
    let t = FilterTranslator::new(Arc::new(model), FilterSettings::default());
    assert!(matches!(
        t.translate("result mod 2 eq 0", "Observation"),
        Err(FilterError::Query(InvalidQueryError::TypeMismatch { .. }))
    ));
}

#[test]
fn arithmetic_precedence_and_doubles() {
    let obs = observation("1", json!(2.5));
    assert!(check("Observation", "result mul 2 add 1 eq 6", &obs));
    assert!(check("Observation", "result div 2 lt 1.3", &obs));
    assert!(check("Observation", "- result eq -2.5", &obs));
    assert!(!check("Observation", "result div (result sub 2.5) gt 0", &obs));
    assert!(!check("Observation", "not (result div (result sub 2.5) gt 0)", &obs));
}

// ============================================================================
// Null and absent values
// ============================================================================

#[test]
fn null_semantics() {
    let thing = EntitySnapshot::new("Thing", "1").with_property("name", json!("station"));
    assert!(check("Thing", "description eq null", &thing));
    assert!(!check("Thing", "description ne null", &thing));
    assert!(check("Thing", "name ne null", &thing));
    // Absent values do not satisfy ordinary comparisons in either direction.
    assert!(!check("Thing", "description eq 'x'", &thing));
    assert!(!check("Thing", "description ne 'x'", &thing));
    assert!(check("Thing", "description eq 'x' or name eq 'station'", &thing));
}

// ============================================================================
// Text, navigation and JSON
// ============================================================================

#[test]
fn text_comparisons_are_ordinal() {
    let thing = EntitySnapshot::new("Thing", "1").with_property("name", json!("Zeta"));
    assert!(check("Thing", "name lt 'a'", &thing));
    assert!(check("Thing", "name gt 'Alpha'", &thing));
    assert!(check("Thing", "tolower(name) eq 'zeta'", &thing));
    assert!(check("Thing", "startswith(name, 'Ze') and length(name) eq 4", &thing));
    assert!(check("Thing", "substringof('et', name)", &thing));
}

#[test]
fn to_one_navigation_reads_related_entities() {
    let obs = observation("1", json!(20)).with_related(
        "Datastream",
        EntitySnapshot::new("Datastream", "9")
            .with_property("name", json!("air temperature"))
            .with_related(
                "Thing",
                EntitySnapshot::new("Thing", "3").with_property("name", json!("roof")),
            ),
    );
    assert!(check("Observation", "Datastream/name eq 'air temperature'", &obs));
    assert!(check("Observation", "Datastream/Thing/name eq 'roof'", &obs));
    assert!(check("Observation", "Datastream/@iot.id eq 9", &obs));
    // Unloaded navigation reads as absent.
    assert!(check("Observation", "FeatureOfInterest/name eq null", &obs));
}

#[test]
fn json_properties() {
    let thing = EntitySnapshot::new("Thing", "1").with_property(
        "properties",
        json!({"owner": {"name": "ann"}, "floors": [1, 2, 3], "height": 12.5}),
    );
    assert!(check("Thing", "properties/owner/name eq 'ann'", &thing));
    assert!(check("Thing", "properties/floors/2 eq 3", &thing));
    assert!(check("Thing", "properties/height gt 12", &thing));
    assert!(check("Thing", "properties/missing eq null", &thing));
    assert!(!check("Thing", "properties/owner/name gt 5", &thing));
}

#[test]
fn ids_compare_numerically_when_numeric() {
    let thing = EntitySnapshot::new("Thing", "42");
    assert!(check("Thing", "id eq 42", &thing));
    assert!(check("Thing", "id gt 40", &thing));
    let named = EntitySnapshot::new("Thing", "abc");
    assert!(check("Thing", "id eq 'abc'", &named));
}

#[test]
fn ids_match_their_quoted_form() {
    let seven = EntitySnapshot::new("Thing", "7");
    assert!(check("Thing", "id eq '7'", &seven));
    assert!(check("Thing", "id eq 7", &seven));
    assert!(check("Thing", "@iot.id eq '7'", &seven));

    let padded = EntitySnapshot::new("Thing", "07");
    assert!(check("Thing", "id eq '07'", &padded));
    assert!(!check("Thing", "id eq 7", &padded));
    assert!(!check("Thing", "id eq '7'", &padded));

    let obs = observation("1", json!(0))
        .with_related("Datastream", EntitySnapshot::new("Datastream", "9"));
    assert!(check("Observation", "Datastream/id eq '9'", &obs));
}

// ============================================================================
// Time
// ============================================================================

#[test]
fn instants_and_periods() {
    let ds = EntitySnapshot::new("Datastream", "1")
        .with_property("phenomenonTime", json!("2020-01-01T00:00:00Z/2020-02-01T00:00:00Z"));
    assert!(check("Datastream", "phenomenonTime eq 2020-01-15T00:00:00Z", &ds));
    assert!(!check("Datastream", "phenomenonTime eq 2020-02-01T00:00:00Z", &ds));
    assert!(check("Datastream", "phenomenonTime ne 2020-03-01T00:00:00Z", &ds));
    assert!(check(
        "Datastream",
        "phenomenonTime eq 2020-01-01T00:00:00Z/2020-02-01T00:00:00Z",
        &ds
    ));
    assert!(check(
        "Datastream",
        "maxdatetime(phenomenonTime) eq 2020-02-01T00:00:00Z",
        &ds
    ));
}

#[test]
fn observation_time_values() {
    let instant = observation("1", json!(1))
        .with_property("phenomenonTime", json!("2021-06-01T12:00:00+02:00"))
        .with_property("resultTime", json!("2021-06-01T10:00:00Z"));
    assert!(check("Observation", "phenomenonTime eq resultTime", &instant));
    assert!(check("Observation", "phenomenonTime lt 2021-06-02T00:00:00Z", &instant));
    assert!(check("Observation", "year(phenomenonTime) eq 2021 and hour(resultTime) eq 10", &instant));
    assert!(check("Observation", "resultTime gt '2021-01-01T00:00:00Z'", &instant));

    let period = observation("2", json!(1))
        .with_property("phenomenonTime", json!("2021-06-01T00:00:00Z/2021-06-02T00:00:00Z"));
    assert!(check("Observation", "phenomenonTime eq 2021-06-01T12:00:00Z", &period));
    // Ordering a period at runtime is unknown.
    assert!(!check("Observation", "phenomenonTime lt 2022-01-01T00:00:00Z", &period));
}

// ============================================================================
// Geometry
// ============================================================================

#[test]
fn spatial_functions() {
    let loc = EntitySnapshot::new("Location", "1").with_property(
        "location",
        json!({"type": "Point", "coordinates": [3.0, 4.0]}),
    );
    assert!(check("Location", "geo.distance(location, geography'POINT(0 0)') eq 5", &loc));
    assert!(check(
        "Location",
        "geo.intersects(location, geography'POLYGON((0 0, 10 0, 10 10, 0 10, 0 0))')",
        &loc
    ));
    assert!(check("Location", "location eq geography'SRID=4326;POINT(3 4)'", &loc));
    assert!(!check("Location", "location eq geography'SRID=3857;POINT(3 4)'", &loc));

    let p = translator()
        .translate("geo.length(geography'LINESTRING(0 0, 3 4)') gt 4.9", "Location")
        .unwrap();
    assert!(p.evaluate(&loc));
    let BoundExpr::Compare { left, .. } = p.expr() else {
        panic!("expected comparison")
    };
    let value = sensorpath_filter::eval::evaluate_constant(left).unwrap();
    assert_relative_eq!(value.as_f64().unwrap(), 5.0);
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn malformed_and_unbindable_filters() {
    let t = translator();
    assert!(matches!(
        t.translate("result eq", "Observation"),
        Err(FilterError::Expression(InvalidFilterExpressionError::Syntax { .. }))
    ));
    assert!(matches!(
        t.translate("result div 0 gt 1", "Observation"),
        Err(FilterError::Query(InvalidQueryError::DivisionByZero))
    ));
    assert!(matches!(
        t.translate("Datastreams/name eq 'x'", "Thing"),
        Err(FilterError::Query(InvalidQueryError::ToManyNavigation { .. }))
    ));
    assert!(matches!(
        t.translate("validTime gt 2020-01-01T00:00:00Z", "Observation"),
        Err(FilterError::Query(InvalidQueryError::PeriodOrdering { .. }))
    ));
}

// ============================================================================
// Properties
// ============================================================================

fn leaf() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("result".to_string()),
        Just("id".to_string()),
        (-1000i64..1000).prop_map(|i| i.to_string()),
        Just("null".to_string()),
    ]
}

fn arithmetic() -> impl Strategy<Value = String> {
    leaf().prop_recursive(4, 16, 2, |inner| {
        (inner.clone(), prop_oneof![Just("add"), Just("sub"), Just("mul")], inner)
            .prop_map(|(l, op, r)| format!("({l} {op} {r})"))
    })
}

fn condition() -> impl Strategy<Value = String> {
    let comparison = (arithmetic(), prop_oneof![Just("eq"), Just("ne"), Just("lt"), Just("ge")], arithmetic())
        .prop_map(|(l, op, r)| format!("{l} {op} {r}"));
    comparison.prop_recursive(3, 12, 2, |inner| {
        prop_oneof![
            (inner.clone(), prop_oneof![Just("and"), Just("or")], inner.clone())
                .prop_map(|(l, op, r)| format!("({l} {op} {r})")),
            inner.prop_map(|c| format!("not ({c})")),
        ]
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn generated_filters_bind_and_evaluate_consistently(
        filter in condition(),
        result in -50i64..50,
    ) {
        let t = translator();
        let predicate = match t.translate(&filter, "Observation") {
            Ok(p) => p,
            // `null` on both sides of an ordering comparison is a bind error.
            Err(FilterError::Query(_)) => return Ok(()),
            Err(e) => panic!("{filter}: {e}"),
        };
        let obs = observation("7", json!(result));
        prop_assert_eq!(predicate.evaluate(&obs), predicate.evaluate(&obs));

        // A filter and its negation never both match.
        let negated = t.translate(&format!("not ({filter})"), "Observation").unwrap();
        prop_assert!(!(predicate.evaluate(&obs) && negated.evaluate(&obs)));

        // The displayed parse tree binds to the same predicate.
        let reparsed = t.translate(&t.parse(&filter).unwrap().to_string(), "Observation").unwrap();
        prop_assert_eq!(reparsed, predicate);
    }

    #[test]
    fn parser_never_panics(input in ".{0,80}") {
        let _ = parse_filter(&input);
    }
}
