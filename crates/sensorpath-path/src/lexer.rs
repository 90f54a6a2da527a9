//! Resource path lexer.
//!
//! Grammar (shared by HTTP resource paths and MQTT topics):
//!
//! ```text
//! path       := '/' element ('/' element)*
//! element    := name ('(' identifier ')')? | '$' name
//! identifier := raw | "'" (char | "''")* "'"
//! ```
//!
//! The lexer only scans. Whether a trailing bare name is a property or a
//! navigation is decided by the resolver against the entity model; the lexer
//! marks that candidate as [`Token::PropertySuffix`].

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char as pchar, none_of},
    combinator::{map, recognize, value},
    multi::fold_many0,
    sequence::{delimited, tuple},
    IResult,
};
use serde::{Deserialize, Serialize};

use crate::error::InvalidUrlError;
use crate::resolved::PathModifier;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Token {
    /// A collection or navigation name.
    Segment(String),
    /// Content of a parenthesised suffix, unescaped.
    Identifier(String),
    /// The last bare name of a multi-element path: a property or a navigation.
    PropertySuffix(String),
    /// `$ref` / `$value`.
    Modifier(PathModifier),
}

enum Element {
    Named {
        name: String,
        identifier: Option<String>,
    },
    Modifier(PathModifier),
}

pub fn tokenize(path: &str) -> Result<Vec<Token>, InvalidUrlError> {
    let fail = |rest: &str, message: &str| {
        InvalidUrlError::syntax(path, path.len() - rest.len(), message)
    };

    let Some(mut rest) = path.strip_prefix('/') else {
        return Err(fail(path, "path must start with `/`"));
    };

    let mut elements: Vec<Element> = Vec::new();
    loop {
        if rest.is_empty() || rest.starts_with('/') {
            return Err(fail(rest, "empty path segment"));
        }

        if let Some(after_dollar) = rest.strip_prefix('$') {
            let (after, modifier_name) = name(after_dollar)
                .map_err(|_| fail(after_dollar, "expected a modifier name after `$`"))?;
            let modifier = PathModifier::from_name(modifier_name)
                .ok_or_else(|| fail(rest, "unknown path modifier"))?;
            elements.push(Element::Modifier(modifier));
            rest = after;
        } else {
            let (after, segment_name) =
                name(rest).map_err(|_| fail(rest, "expected a segment name"))?;
            rest = after;

            let mut id = None;
            if rest.starts_with('(') {
                let (after_id, parsed) = identifier(rest)
                    .map_err(|_| fail(rest, "malformed identifier or unbalanced parentheses"))?;
                if parsed.is_empty() {
                    return Err(fail(rest, "empty identifier"));
                }
                id = Some(parsed);
                rest = after_id;
            }

            elements.push(Element::Named {
                name: segment_name.to_string(),
                identifier: id,
            });
        }

        if rest.is_empty() {
            break;
        }
        match rest.strip_prefix('/') {
            Some(next) => rest = next,
            None if rest.starts_with(')') || rest.starts_with('(') => {
                return Err(fail(rest, "unbalanced parentheses"))
            }
            None => return Err(fail(rest, "expected `/`")),
        }
    }

    let last_named = elements
        .iter()
        .rposition(|e| matches!(e, Element::Named { .. }));

    let mut tokens = Vec::with_capacity(elements.len() + 2);
    for (index, element) in elements.into_iter().enumerate() {
        match element {
            Element::Modifier(modifier) => tokens.push(Token::Modifier(modifier)),
            Element::Named {
                name,
                identifier: None,
            } if index > 0 && Some(index) == last_named => {
                tokens.push(Token::PropertySuffix(name));
            }
            Element::Named { name, identifier } => {
                tokens.push(Token::Segment(name));
                if let Some(id) = identifier {
                    tokens.push(Token::Identifier(id));
                }
            }
        }
    }
    Ok(tokens)
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_name_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn name(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        take_while1(is_name_start),
        take_while(is_name_continue),
    )))(input)
}

fn identifier(input: &str) -> IResult<&str, String> {
    delimited(pchar('('), alt((quoted_identifier, raw_identifier)), pchar(')'))(input)
}

fn raw_identifier(input: &str) -> IResult<&str, String> {
    map(
        take_while1(|c: char| !matches!(c, '(' | ')' | '/' | '\'')),
        |s: &str| s.to_string(),
    )(input)
}

fn quoted_identifier(input: &str) -> IResult<&str, String> {
    delimited(
        pchar('\''),
        fold_many0(
            alt((value('\'', tag("''")), none_of("'"))),
            String::new,
            |mut acc, c| {
                acc.push(c);
                acc
            },
        ),
        pchar('\''),
    )(input)
}
