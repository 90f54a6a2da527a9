//! nom parser for `$filter` expressions.
//!
//! Precedence, loosest first:
//!
//! ```text
//! or < and < eq ne lt le gt ge (non-associative) < add sub < mul div mod
//!    < not, unary minus < literal | call | property | ( expr )
//! ```

use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, tag_no_case, take_while, take_while1, take_while_m_n},
    character::complete::{char as pchar, digit1, multispace0, one_of, satisfy},
    combinator::{all_consuming, cut, map, map_res, not, opt, peek, recognize, value},
    multi::{fold_many0, many0, separated_list0, separated_list1},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

use crate::error::InvalidFilterExpressionError;
use crate::expr::{BinaryOp, FilterExpr, UnaryOp};
use crate::geometry::Geometry;
use crate::settings::FilterSettings;
use crate::value::{parse_time_value, Value};

/// Parses with default settings.
pub fn parse_filter(text: &str) -> Result<FilterExpr, InvalidFilterExpressionError> {
    parse_filter_with(text, &FilterSettings::default())
}

pub fn parse_filter_with(
    text: &str,
    settings: &FilterSettings,
) -> Result<FilterExpr, InvalidFilterExpressionError> {
    if text.trim().is_empty() {
        return Err(InvalidFilterExpressionError::Empty);
    }
    // Recursion only happens through parentheses, so bound it before parsing.
    if paren_nesting(text) >= settings.max_depth {
        return Err(InvalidFilterExpressionError::TooDeep {
            max: settings.max_depth,
        });
    }
    let expr = match all_consuming(ws(or_expr))(text) {
        Ok((_, expr)) => expr,
        Err(nom::Err::Error(e) | nom::Err::Failure(e)) => {
            return Err(syntax_error(text, e.input));
        }
        Err(nom::Err::Incomplete(_)) => return Err(syntax_error(text, "")),
    };
    if expr.depth() > settings.max_depth {
        return Err(InvalidFilterExpressionError::TooDeep {
            max: settings.max_depth,
        });
    }
    Ok(expr)
}

fn syntax_error(text: &str, rest: &str) -> InvalidFilterExpressionError {
    let offset = text.len() - rest.len();
    let message = if rest.is_empty() {
        "unexpected end of filter".to_string()
    } else {
        let snippet: String = rest.chars().take(16).collect();
        format!("unexpected `{snippet}`")
    };
    InvalidFilterExpressionError::Syntax { offset, message }
}

fn paren_nesting(text: &str) -> usize {
    let (mut depth, mut max, mut in_string) = (0usize, 0usize, false);
    for c in text.chars() {
        match c {
            '\'' => in_string = !in_string,
            '(' if !in_string => {
                depth += 1;
                max = max.max(depth);
            }
            ')' if !in_string => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    max
}

// ============================================================================
// Lexical helpers
// ============================================================================

fn ws<'a, O>(
    inner: impl FnMut(&'a str) -> IResult<&'a str, O>,
) -> impl FnMut(&'a str) -> IResult<&'a str, O> {
    delimited(multispace0, inner, multispace0)
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// A case-insensitive word that is not the prefix of a longer name.
fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    ws(terminated(tag_no_case(kw), not(satisfy(is_name_char))))
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c| c.is_ascii_alphabetic() || c == '_'),
        take_while(is_name_char),
    ))(input)
}

fn quoted(input: &str) -> IResult<&str, String> {
    delimited(
        pchar('\''),
        fold_many0(
            alt((value("'", tag("''")), is_not("'"))),
            String::new,
            |mut acc, piece| {
                acc.push_str(piece);
                acc
            },
        ),
        pchar('\''),
    )(input)
}

// ============================================================================
// Operators
// ============================================================================

fn fold_left(first: FilterExpr, rest: Vec<(BinaryOp, FilterExpr)>) -> FilterExpr {
    rest.into_iter()
        .fold(first, |acc, (op, rhs)| FilterExpr::binary(op, acc, rhs))
}

fn or_expr(input: &str) -> IResult<&str, FilterExpr> {
    let (input, first) = and_expr(input)?;
    let (input, rest) = many0(pair(value(BinaryOp::Or, keyword("or")), and_expr))(input)?;
    Ok((input, fold_left(first, rest)))
}

fn and_expr(input: &str) -> IResult<&str, FilterExpr> {
    let (input, first) = comparison(input)?;
    let (input, rest) = many0(pair(value(BinaryOp::And, keyword("and")), comparison))(input)?;
    Ok((input, fold_left(first, rest)))
}

fn comparison(input: &str) -> IResult<&str, FilterExpr> {
    let (input, left) = additive(input)?;
    let (input, right) = opt(pair(comparison_op, additive))(input)?;
    Ok(match right {
        Some((op, right)) => (input, FilterExpr::binary(op, left, right)),
        None => (input, left),
    })
}

fn comparison_op(input: &str) -> IResult<&str, BinaryOp> {
    alt((
        value(BinaryOp::Eq, keyword("eq")),
        value(BinaryOp::Ne, keyword("ne")),
        value(BinaryOp::Lt, keyword("lt")),
        value(BinaryOp::Le, keyword("le")),
        value(BinaryOp::Gt, keyword("gt")),
        value(BinaryOp::Ge, keyword("ge")),
    ))(input)
}

fn additive(input: &str) -> IResult<&str, FilterExpr> {
    let (input, first) = multiplicative(input)?;
    let (input, rest) = many0(pair(
        alt((
            value(BinaryOp::Add, keyword("add")),
            value(BinaryOp::Sub, keyword("sub")),
        )),
        multiplicative,
    ))(input)?;
    Ok((input, fold_left(first, rest)))
}

fn multiplicative(input: &str) -> IResult<&str, FilterExpr> {
    let (input, first) = unary(input)?;
    let (input, rest) = many0(pair(
        alt((
            value(BinaryOp::Mul, keyword("mul")),
            value(BinaryOp::Div, keyword("div")),
            value(BinaryOp::Mod, keyword("mod")),
        )),
        unary,
    ))(input)?;
    Ok((input, fold_left(first, rest)))
}

/// Prefix operators are collected iteratively so long chains cannot
/// exhaust the stack.
fn unary(input: &str) -> IResult<&str, FilterExpr> {
    let (input, prefixes) = many0(alt((
        value(UnaryOp::Not, keyword("not")),
        // A minus glued to a digit belongs to the number literal.
        value(
            UnaryOp::Neg,
            ws(terminated(pchar('-'), not(peek(satisfy(|c| c.is_ascii_digit()))))),
        ),
    )))(input)?;
    let (input, operand) = primary(input)?;
    let expr = prefixes
        .into_iter()
        .rev()
        .fold(operand, |e, op| FilterExpr::unary(op, e));
    Ok((input, expr))
}

fn primary(input: &str) -> IResult<&str, FilterExpr> {
    ws(alt((
        delimited(pchar('('), ws(or_expr), pchar(')')),
        map(literal, FilterExpr::literal),
        call,
        property_path,
    )))(input)
}

// ============================================================================
// Operands
// ============================================================================

fn literal(input: &str) -> IResult<&str, Value> {
    alt((
        value(Value::Null, keyword("null")),
        value(Value::Boolean(true), keyword("true")),
        value(Value::Boolean(false), keyword("false")),
        geometry_literal,
        map(quoted, Value::Text),
        time_literal,
        number_literal,
    ))(input)
}

fn geometry_literal(input: &str) -> IResult<&str, Value> {
    preceded(
        terminated(
            alt((tag_no_case("geography"), tag_no_case("geometry"))),
            peek(pchar('\'')),
        ),
        cut(map_res(quoted, |wkt| {
            Geometry::parse_wkt(&wkt)
                .map(Value::Geometry)
                .ok_or("invalid geometry")
        })),
    )(input)
}

fn time_literal(input: &str) -> IResult<&str, Value> {
    map_res(
        recognize(tuple((
            take_while_m_n(4, 4, |c: char| c.is_ascii_digit()),
            pchar('-'),
            take_while1(|c: char| c.is_ascii_digit() || "-:.+/TZ".contains(c)),
        ))),
        |text: &str| parse_time_value(text).ok_or("invalid time literal"),
    )(input)
}

fn number_literal(input: &str) -> IResult<&str, Value> {
    map_res(
        recognize(tuple((
            opt(pchar('-')),
            digit1,
            opt(pair(pchar('.'), digit1)),
            opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
        ))),
        |text: &str| {
            if text.contains(['.', 'e', 'E']) {
                text.parse::<f64>().map(Value::Double)
            } else {
                text.parse::<i64>()
                    .map(Value::Integer)
                    .or_else(|_| text.parse::<f64>().map(Value::Double))
            }
        },
    )(input)
}

fn call(input: &str) -> IResult<&str, FilterExpr> {
    map(
        tuple((
            recognize(pair(identifier, opt(pair(pchar('.'), identifier)))),
            preceded(multispace0, pchar('(')),
            separated_list0(pchar(','), ws(or_expr)),
            pchar(')'),
        )),
        |(name, _, args, _)| FilterExpr::Call {
            name: name.to_string(),
            args,
        },
    )(input)
}

fn property_path(input: &str) -> IResult<&str, FilterExpr> {
    map(
        separated_list1(
            pchar('/'),
            // Digits address array elements inside JSON values.
            alt((value("id", tag_no_case("@iot.id")), identifier, digit1)),
        ),
        FilterExpr::property,
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prop(name: &str) -> FilterExpr {
        FilterExpr::property([name])
    }

    fn int(i: i64) -> FilterExpr {
        FilterExpr::literal(Value::Integer(i))
    }

    #[test]
    fn precedence() {
        let e = parse_filter("a eq 1 or b eq 2 and c eq 3").unwrap();
        let expected = FilterExpr::binary(
            BinaryOp::Or,
            FilterExpr::binary(BinaryOp::Eq, prop("a"), int(1)),
            FilterExpr::binary(
                BinaryOp::And,
                FilterExpr::binary(BinaryOp::Eq, prop("b"), int(2)),
                FilterExpr::binary(BinaryOp::Eq, prop("c"), int(3)),
            ),
        );
        assert_eq!(e, expected);

        let e = parse_filter("result mod 2 eq 0").unwrap();
        assert_eq!(
            e,
            FilterExpr::binary(
                BinaryOp::Eq,
                FilterExpr::binary(BinaryOp::Mod, prop("result"), int(2)),
                int(0)
            )
        );

        let e = parse_filter("a add b mul c").unwrap();
        assert_eq!(
            e,
            FilterExpr::binary(
                BinaryOp::Add,
                prop("a"),
                FilterExpr::binary(BinaryOp::Mul, prop("b"), prop("c"))
            )
        );
    }

    #[test]
    fn comparisons_do_not_chain() {
        assert!(parse_filter("a eq b eq c").is_err());
        assert!(parse_filter("(a eq b) eq true").is_ok());
    }

    #[test]
    fn keywords_need_word_boundaries() {
        let e = parse_filter("order eq 1 and notes ne 'x'").unwrap();
        let FilterExpr::Binary { left, right, .. } = e else {
            panic!("expected and")
        };
        assert!(matches!(*left, FilterExpr::Binary { ref left, .. } if **left == prop("order")));
        assert!(matches!(*right, FilterExpr::Binary { ref left, .. } if **left == prop("notes")));
    }

    #[test]
    fn literals() {
        let lit = |s: &str| match parse_filter(s).unwrap() {
            FilterExpr::Literal { value } => value,
            other => panic!("{s} parsed as {other:?}"),
        };
        assert_eq!(lit("null"), Value::Null);
        assert_eq!(lit("TRUE"), Value::Boolean(true));
        assert_eq!(lit("-42"), Value::Integer(-42));
        assert_eq!(lit("2.5e3"), Value::Double(2500.0));
        assert_eq!(lit("'it''s'"), Value::Text("it's".into()));
        assert!(matches!(lit("2020-01-01T00:00:00Z"), Value::Instant(_)));
        assert!(matches!(
            lit("2020-01-01T00:00:00Z/2020-01-02T00:00:00Z"),
            Value::Period(_)
        ));
        assert!(matches!(
            lit("geography'SRID=4326;POINT(1 2)'"),
            Value::Geometry(_)
        ));
    }

    #[test]
    fn unary_minus_and_not() {
        assert_eq!(
            parse_filter("- a").unwrap(),
            FilterExpr::unary(UnaryOp::Neg, prop("a"))
        );
        assert_eq!(
            parse_filter("not not a").unwrap(),
            FilterExpr::unary(UnaryOp::Not, FilterExpr::unary(UnaryOp::Not, prop("a")))
        );
        assert_eq!(
            parse_filter("--5").unwrap(),
            FilterExpr::unary(UnaryOp::Neg, int(-5))
        );
    }

    #[test]
    fn paths_and_calls() {
        assert_eq!(
            parse_filter("Datastream/Thing/name").unwrap(),
            FilterExpr::property(["Datastream", "Thing", "name"])
        );
        assert_eq!(parse_filter("@iot.id").unwrap(), prop("id"));
        let e = parse_filter("geo.distance(location, geography'POINT(0 0)') lt 5").unwrap();
        let FilterExpr::Binary { left, .. } = e else {
            panic!("expected comparison")
        };
        assert!(matches!(*left, FilterExpr::Call { ref name, ref args } if name == "geo.distance" && args.len() == 2));
        assert_eq!(
            parse_filter("now()").unwrap(),
            FilterExpr::Call {
                name: "now".into(),
                args: vec![]
            }
        );
    }

    #[test]
    fn syntax_errors_carry_offsets() {
        match parse_filter("name eq 'x' and") {
            Err(InvalidFilterExpressionError::Syntax { offset, .. }) => assert_eq!(offset, 12),
            other => panic!("{other:?}"),
        }
        match parse_filter("location eq geography'POINT(1)'") {
            Err(InvalidFilterExpressionError::Syntax { offset, .. }) => assert_eq!(offset, 21),
            other => panic!("{other:?}"),
        }
        assert_eq!(parse_filter("  "), Err(InvalidFilterExpressionError::Empty));
        assert!(parse_filter("name eq 'unterminated").is_err());
        assert!(parse_filter("(a eq 1").is_err());
    }

    #[test]
    fn nesting_is_bounded() {
        let settings = FilterSettings { max_depth: 8 };
        let deep = format!("{}a{}", "(".repeat(20), ")".repeat(20));
        assert_eq!(
            parse_filter_with(&deep, &settings),
            Err(InvalidFilterExpressionError::TooDeep { max: 8 })
        );
        assert!(parse_filter_with("((a eq 1))", &settings).is_ok());

        let long_not = format!("{}a", "not ".repeat(1_000));
        assert!(parse_filter(&long_not).is_err());
    }

    #[test]
    fn display_reparses() {
        for text in [
            "a eq 1 or b eq 2 and not c",
            "- a add -3 mul 2.0 ge length(name)",
            "phenomenonTime eq 2020-01-01T00:00:00Z/2020-01-02T00:00:00Z",
            "name eq 'it''s' and properties/owner ne null",
            "geo.intersects(location, geography'POLYGON((0 0, 1 0, 1 1, 0 0))')",
        ] {
            let e = parse_filter(text).unwrap();
            assert_eq!(parse_filter(&e.to_string()).unwrap(), e, "{text}");
        }
    }
}
