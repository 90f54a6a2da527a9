//! Built-in filter functions: signatures for binding, implementations for
//! evaluation.

use chrono::{Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::binder::ValueKind;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Function {
    SubstringOf,
    Contains,
    StartsWith,
    EndsWith,
    Length,
    IndexOf,
    Substring,
    ToLower,
    ToUpper,
    Trim,
    Concat,
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    Now,
    MinDateTime,
    MaxDateTime,
    Round,
    Floor,
    Ceiling,
    GeoDistance,
    GeoLength,
    GeoIntersects,
}

use ValueKind::{Boolean, Geometry, Instant, Number, Period, Text};

impl Function {
    pub const ALL: [Function; 26] = [
        Function::SubstringOf,
        Function::Contains,
        Function::StartsWith,
        Function::EndsWith,
        Function::Length,
        Function::IndexOf,
        Function::Substring,
        Function::ToLower,
        Function::ToUpper,
        Function::Trim,
        Function::Concat,
        Function::Year,
        Function::Month,
        Function::Day,
        Function::Hour,
        Function::Minute,
        Function::Second,
        Function::Now,
        Function::MinDateTime,
        Function::MaxDateTime,
        Function::Round,
        Function::Floor,
        Function::Ceiling,
        Function::GeoDistance,
        Function::GeoLength,
        Function::GeoIntersects,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Function::SubstringOf => "substringof",
            Function::Contains => "contains",
            Function::StartsWith => "startswith",
            Function::EndsWith => "endswith",
            Function::Length => "length",
            Function::IndexOf => "indexof",
            Function::Substring => "substring",
            Function::ToLower => "tolower",
            Function::ToUpper => "toupper",
            Function::Trim => "trim",
            Function::Concat => "concat",
            Function::Year => "year",
            Function::Month => "month",
            Function::Day => "day",
            Function::Hour => "hour",
            Function::Minute => "minute",
            Function::Second => "second",
            Function::Now => "now",
            Function::MinDateTime => "mindatetime",
            Function::MaxDateTime => "maxdatetime",
            Function::Round => "round",
            Function::Floor => "floor",
            Function::Ceiling => "ceiling",
            Function::GeoDistance => "geo.distance",
            Function::GeoLength => "geo.length",
            Function::GeoIntersects => "geo.intersects",
        }
    }

    /// Case-insensitive lookup.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(name))
    }

    /// Declared parameter kinds. `substring` takes an optional third.
    pub fn params(self) -> &'static [ValueKind] {
        match self {
            Function::SubstringOf
            | Function::Contains
            | Function::StartsWith
            | Function::EndsWith
            | Function::IndexOf
            | Function::Concat => &[Text, Text],
            Function::Length | Function::ToLower | Function::ToUpper | Function::Trim => &[Text],
            Function::Substring => &[Text, Number, Number],
            Function::Year
            | Function::Month
            | Function::Day
            | Function::Hour
            | Function::Minute
            | Function::Second => &[Instant],
            Function::Now => &[],
            Function::MinDateTime | Function::MaxDateTime => &[Period],
            Function::Round | Function::Floor | Function::Ceiling => &[Number],
            Function::GeoDistance | Function::GeoIntersects => &[Geometry, Geometry],
            Function::GeoLength => &[Geometry],
        }
    }

    pub fn min_args(self) -> usize {
        match self {
            Function::Substring => 2,
            other => other.params().len(),
        }
    }

    pub fn result(self) -> ValueKind {
        match self {
            Function::SubstringOf
            | Function::Contains
            | Function::StartsWith
            | Function::EndsWith
            | Function::GeoIntersects => Boolean,
            Function::Length
            | Function::IndexOf
            | Function::Year
            | Function::Month
            | Function::Day
            | Function::Hour
            | Function::Minute
            | Function::Second
            | Function::Round
            | Function::Floor
            | Function::Ceiling
            | Function::GeoDistance
            | Function::GeoLength => Number,
            Function::Substring
            | Function::ToLower
            | Function::ToUpper
            | Function::Trim
            | Function::Concat => Text,
            Function::Now | Function::MinDateTime | Function::MaxDateTime => Instant,
        }
    }

    /// Whether an argument of kind `actual` may fill a parameter of kind
    /// `param`. Time parameters also take time values that resolve at
    /// runtime.
    pub fn accepts(param: ValueKind, actual: ValueKind) -> bool {
        match (param, actual) {
            (_, ValueKind::Dynamic | ValueKind::Null) => true,
            (Instant, ValueKind::TimeValue) => true,
            (Period, Instant | ValueKind::TimeValue) => true,
            (p, a) => p == a,
        }
    }

    /// Applies the function to evaluated arguments. `None` means unknown.
    pub fn call(self, args: &[Value]) -> Option<Value> {
        if args.iter().any(Value::is_null) {
            return Some(Value::Null);
        }
        let text = |i: usize| args.get(i).and_then(Value::as_text);
        let number = |i: usize| args.get(i).and_then(Value::as_f64);
        let instant = |i: usize| match args.get(i) {
            Some(Value::Instant(t)) => Some(*t),
            _ => None,
        };
        let geometry = |i: usize| match args.get(i) {
            Some(Value::Geometry(g)) => Some(g),
            _ => None,
        };

        let value = match self {
            Function::SubstringOf => Value::Boolean(text(1)?.contains(text(0)?)),
            Function::Contains => Value::Boolean(text(0)?.contains(text(1)?)),
            Function::StartsWith => Value::Boolean(text(0)?.starts_with(text(1)?)),
            Function::EndsWith => Value::Boolean(text(0)?.ends_with(text(1)?)),
            Function::Length => Value::Integer(text(0)?.chars().count() as i64),
            Function::IndexOf => {
                let (haystack, needle) = (text(0)?, text(1)?);
                let index = haystack
                    .find(needle)
                    .map(|byte| haystack[..byte].chars().count() as i64)
                    .unwrap_or(-1);
                Value::Integer(index)
            }
            Function::Substring => {
                let s = text(0)?;
                let start = number(1)?.max(0.0) as usize;
                let chars = s.chars().skip(start);
                let out: String = match args.get(2) {
                    Some(_) => chars.take(number(2)?.max(0.0) as usize).collect(),
                    None => chars.collect(),
                };
                Value::Text(out)
            }
            Function::ToLower => Value::Text(text(0)?.to_lowercase()),
            Function::ToUpper => Value::Text(text(0)?.to_uppercase()),
            Function::Trim => Value::Text(text(0)?.trim().to_string()),
            Function::Concat => Value::Text(format!("{}{}", text(0)?, text(1)?)),
            Function::Year => Value::Integer(i64::from(instant(0)?.year())),
            Function::Month => Value::Integer(i64::from(instant(0)?.month())),
            Function::Day => Value::Integer(i64::from(instant(0)?.day())),
            Function::Hour => Value::Integer(i64::from(instant(0)?.hour())),
            Function::Minute => Value::Integer(i64::from(instant(0)?.minute())),
            Function::Second => Value::Integer(i64::from(instant(0)?.second())),
            Function::Now => Value::Instant(Utc::now()),
            Function::MinDateTime => match args.first()? {
                Value::Period(p) => Value::Instant(p.start),
                Value::Instant(t) => Value::Instant(*t),
                _ => return None,
            },
            Function::MaxDateTime => match args.first()? {
                Value::Period(p) => Value::Instant(p.end),
                Value::Instant(t) => Value::Instant(*t),
                _ => return None,
            },
            Function::Round | Function::Floor | Function::Ceiling => match args.first()? {
                Value::Integer(i) => Value::Integer(*i),
                Value::Double(d) => Value::Double(match self {
                    Function::Round => d.round(),
                    Function::Floor => d.floor(),
                    _ => d.ceil(),
                }),
                _ => return None,
            },
            Function::GeoDistance => Value::Double(geometry(0)?.distance(geometry(1)?)),
            Function::GeoLength => Value::Double(geometry(0)?.length()),
            Function::GeoIntersects => Value::Boolean(geometry(0)?.intersects(geometry(1)?)),
        };
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{parse_instant, parse_interval};

    fn text(s: &str) -> Value {
        Value::Text(s.into())
    }

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(Function::from_name("SubStringOf"), Some(Function::SubstringOf));
        assert_eq!(Function::from_name("geo.Distance"), Some(Function::GeoDistance));
        assert_eq!(Function::from_name("nope"), None);
        for f in Function::ALL {
            assert_eq!(Function::from_name(f.name()), Some(f));
        }
    }

    #[test]
    fn string_functions() {
        assert_eq!(
            Function::SubstringOf.call(&[text("mp"), text("Temperature")]),
            Some(Value::Boolean(true))
        );
        assert_eq!(
            Function::Contains.call(&[text("Temperature"), text("xyz")]),
            Some(Value::Boolean(false))
        );
        assert_eq!(
            Function::IndexOf.call(&[text("grüße"), text("ß")]),
            Some(Value::Integer(3))
        );
        assert_eq!(
            Function::Substring.call(&[text("sensor"), Value::Integer(1), Value::Integer(3)]),
            Some(text("ens"))
        );
        assert_eq!(
            Function::Substring.call(&[text("sensor"), Value::Integer(4)]),
            Some(text("or"))
        );
        assert_eq!(Function::Length.call(&[Value::Null]), Some(Value::Null));
        assert_eq!(Function::Length.call(&[Value::Integer(3)]), None);
    }

    #[test]
    fn time_functions() {
        let t = parse_instant("2021-03-04T05:06:07Z").unwrap();
        assert_eq!(Function::Year.call(&[Value::Instant(t)]), Some(Value::Integer(2021)));
        assert_eq!(Function::Second.call(&[Value::Instant(t)]), Some(Value::Integer(7)));

        let p = parse_interval("2021-01-01T00:00:00Z/2021-02-01T00:00:00Z").unwrap();
        assert_eq!(
            Function::MaxDateTime.call(&[Value::Period(p)]),
            Some(Value::Instant(p.end))
        );
    }

    #[test]
    fn rounding_keeps_integers() {
        assert_eq!(Function::Floor.call(&[Value::Integer(3)]), Some(Value::Integer(3)));
        assert_eq!(Function::Ceiling.call(&[Value::Double(2.1)]), Some(Value::Double(3.0)));
        assert_eq!(Function::Round.call(&[Value::Double(2.5)]), Some(Value::Double(3.0)));
    }
}
