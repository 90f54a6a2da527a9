//! Geometry values for `geography'...'` literals and GeoJSON properties.
//!
//! Shapes are `geo_types` geometries; measurements use the `geo` Euclidean
//! algorithms, so distances and lengths are planar in the units of the
//! coordinate system. Literals are EWKT: an optional `SRID=n;` prefix handled
//! here, followed by a WKT body read by the `wkt` crate.

use geo::{Distance, Euclidean, Intersects, Length};
use geo_types::{Coord, Geometry as GeoGeometry, LineString, Point, Polygon};
use nom::{
    bytes::complete::{tag_no_case, take_while1},
    character::complete::{char as pchar, digit1, multispace0},
    combinator::{map_res, opt, recognize},
    sequence::{delimited, preceded, terminated, tuple},
    IResult,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use wkt::{ToWkt, TryFromWkt};

/// WGS 84; assumed when a literal carries no `SRID=` prefix.
pub const DEFAULT_SRID: u32 = 4326;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub srid: u32,
    pub shape: GeoGeometry<f64>,
}

impl Geometry {
    pub fn new(shape: GeoGeometry<f64>) -> Self {
        Self {
            srid: DEFAULT_SRID,
            shape,
        }
    }

    /// Parses `[SRID=n;]WKT`, e.g. `SRID=4326;POINT(1 2)`.
    pub fn parse_wkt(text: &str) -> Option<Self> {
        let (rest, (srid, body)) = ewkt(text).ok()?;
        if !rest.trim().is_empty() {
            return None;
        }
        let shape = GeoGeometry::<f64>::try_from_wkt_str(body).ok()?;
        is_well_formed(&shape).then(|| Self {
            srid: srid.unwrap_or(DEFAULT_SRID),
            shape,
        })
    }

    /// Reads a GeoJSON geometry object.
    pub fn from_geojson(value: &serde_json::Value) -> Option<Self> {
        let kind = value.get("type")?.as_str()?;
        let coords = value.get("coordinates")?;
        let shape = match kind {
            "Point" => GeoGeometry::Point(Point::from(json_coord(coords)?)),
            "LineString" => GeoGeometry::LineString(json_ring(coords)?),
            "Polygon" => {
                let mut rings = coords
                    .as_array()?
                    .iter()
                    .map(json_ring)
                    .collect::<Option<Vec<_>>>()?
                    .into_iter();
                let exterior = rings.next()?;
                GeoGeometry::Polygon(Polygon::new(exterior, rings.collect()))
            }
            _ => return None,
        };
        is_well_formed(&shape).then(|| Self::new(shape))
    }

    pub fn distance(&self, other: &Geometry) -> f64 {
        Euclidean.distance(&self.shape, &other.shape)
    }

    /// Length of a line string or perimeter of a polygon's exterior ring.
    pub fn length(&self) -> f64 {
        match &self.shape {
            GeoGeometry::LineString(line) => Euclidean.length(line),
            GeoGeometry::Polygon(polygon) => Euclidean.length(polygon.exterior()),
            _ => 0.0,
        }
    }

    pub fn intersects(&self, other: &Geometry) -> bool {
        self.shape.intersects(&other.shape)
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SRID={};{}", self.srid, self.shape.wkt_string())
    }
}

fn is_well_formed(shape: &GeoGeometry<f64>) -> bool {
    match shape {
        GeoGeometry::Point(_) => true,
        GeoGeometry::LineString(line) => line.0.len() >= 2,
        // Rings are closed on construction, so a triangle has four coordinates.
        GeoGeometry::Polygon(polygon) => polygon.exterior().0.len() >= 4,
        _ => false,
    }
}

// ============================================================================
// EWKT front end
// ============================================================================

/// Splits off the `SRID=n;` prefix and the extent of the WKT body (tag plus
/// one balanced parenthesised group).
fn ewkt(input: &str) -> IResult<&str, (Option<u32>, &str)> {
    let srid = opt(terminated(
        preceded(
            tag_no_case("SRID="),
            map_res(digit1, |d: &str| d.parse::<u32>()),
        ),
        delimited(multispace0, pchar(';'), multispace0),
    ));
    let body = recognize(tuple((
        take_while1(|c: char| c.is_ascii_alphabetic() || c == ' '),
        balanced,
    )));
    preceded(multispace0, tuple((srid, body)))(input)
}

fn balanced(input: &str) -> IResult<&str, &str> {
    let (_, _) = pchar('(')(input)?;
    let mut depth = 0usize;
    for (i, c) in input.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok((&input[i + 1..], &input[..=i]));
                }
            }
            _ => {}
        }
    }
    Err(nom::Err::Error(nom::error::Error::new(
        input,
        nom::error::ErrorKind::Char,
    )))
}

fn json_coord(value: &serde_json::Value) -> Option<Coord<f64>> {
    let arr = value.as_array()?;
    if arr.len() < 2 {
        return None;
    }
    Some(Coord {
        x: arr[0].as_f64()?,
        y: arr[1].as_f64()?,
    })
}

fn json_ring(value: &serde_json::Value) -> Option<LineString<f64>> {
    value
        .as_array()?
        .iter()
        .map(json_coord)
        .collect::<Option<Vec<_>>>()
        .map(LineString::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square() -> Geometry {
        Geometry::parse_wkt("POLYGON((0 0, 10 0, 10 10, 0 10, 0 0))").unwrap()
    }

    #[test]
    fn parses_srid_prefix_and_defaults() {
        let g = Geometry::parse_wkt("SRID=3857;POINT(1 2)").unwrap();
        assert_eq!(g.srid, 3857);
        assert_eq!(g.shape, GeoGeometry::Point(Point::new(1.0, 2.0)));

        let g = Geometry::parse_wkt(" POINT (1.5 -2)").unwrap();
        assert_eq!(g.srid, DEFAULT_SRID);
        assert_eq!(g.shape, GeoGeometry::Point(Point::new(1.5, -2.0)));
    }

    #[test]
    fn rejects_malformed_wkt() {
        assert!(Geometry::parse_wkt("POINT(1)").is_none());
        assert!(Geometry::parse_wkt("LINESTRING(1 2)").is_none());
        assert!(Geometry::parse_wkt("CIRCLE(1 2 3)").is_none());
        assert!(Geometry::parse_wkt("POINT(1 2) trailing").is_none());
        assert!(Geometry::parse_wkt("POINT(1 2").is_none());
        assert!(Geometry::parse_wkt("SRID=x;POINT(1 2)").is_none());
    }

    #[test]
    fn display_reparses() {
        assert_eq!(
            Geometry::parse_wkt("POINT(1 2)").unwrap().to_string(),
            "SRID=4326;POINT(1 2)"
        );
        for wkt in [
            "SRID=3857;LINESTRING(0 0, 3 4)",
            "SRID=4326;POLYGON((0 0, 10 0, 10 10, 0 0), (1 1, 2 1, 2 2, 1 1))",
        ] {
            let g = Geometry::parse_wkt(wkt).unwrap();
            assert_eq!(Geometry::parse_wkt(&g.to_string()), Some(g));
        }
    }

    #[test]
    fn geojson_matches_wkt() {
        let json = serde_json::json!({"type": "Point", "coordinates": [7.5, 51.2]});
        assert_eq!(
            Geometry::from_geojson(&json),
            Geometry::parse_wkt("POINT(7.5 51.2)")
        );
        let json = serde_json::json!({"type": "Polygon", "coordinates": [[[0,0],[10,0],[10,10],[0,10],[0,0]]]});
        assert_eq!(Geometry::from_geojson(&json), Some(square()));
        assert!(Geometry::from_geojson(&serde_json::json!({"type": "Point"})).is_none());
    }

    #[test]
    fn measurements() {
        let line = Geometry::parse_wkt("LINESTRING(0 0, 3 4, 3 10)").unwrap();
        assert_relative_eq!(line.length(), 11.0);
        assert_relative_eq!(square().length(), 40.0);

        let a = Geometry::parse_wkt("POINT(0 0)").unwrap();
        let b = Geometry::parse_wkt("POINT(3 4)").unwrap();
        assert_relative_eq!(a.distance(&b), 5.0);

        let outside = Geometry::parse_wkt("POINT(13 14)").unwrap();
        assert_relative_eq!(square().distance(&outside), 5.0);
        let inside = Geometry::parse_wkt("POINT(5 5)").unwrap();
        assert_relative_eq!(square().distance(&inside), 0.0);
    }

    #[test]
    fn intersections() {
        let sq = square();
        let inside = Geometry::parse_wkt("POINT(5 5)").unwrap();
        let edge = Geometry::parse_wkt("POINT(10 5)").unwrap();
        let outside = Geometry::parse_wkt("POINT(11 5)").unwrap();
        assert!(sq.intersects(&inside));
        assert!(inside.intersects(&sq));
        assert!(sq.intersects(&edge));
        assert!(!sq.intersects(&outside));

        let crossing = Geometry::parse_wkt("LINESTRING(-5 5, 15 5)").unwrap();
        let away = Geometry::parse_wkt("LINESTRING(20 20, 30 30)").unwrap();
        assert!(sq.intersects(&crossing));
        assert!(!sq.intersects(&away));

        let holed = Geometry::parse_wkt(
            "POLYGON((0 0, 10 0, 10 10, 0 10, 0 0), (4 4, 6 4, 6 6, 4 6, 4 4))",
        )
        .unwrap();
        assert!(!holed.intersects(&inside));
    }
}
