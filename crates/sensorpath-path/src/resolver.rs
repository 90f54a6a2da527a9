//! Token stream → [`ResolvedPath`].
//!
//! Steps are validated left to right (each name is looked up in the context of
//! the type the previous step landed on) and emitted most specific first.
//! Every navigation after the first is a single adjacency-table lookup keyed by
//! `(previous type, name)`, so two segments that are not related in the model
//! can never be chained.

use sensorpath_model::{EntityModel, Multiplicity};
use std::sync::Arc;

use crate::error::InvalidUrlError;
use crate::lexer::{tokenize, Token};
use crate::resolved::{PathModifier, PathSegment, PathType, ResolvedPath};
use crate::settings::PathSettings;

#[derive(Debug, Clone)]
pub struct PathResolver {
    model: Arc<EntityModel>,
    settings: PathSettings,
}

impl PathResolver {
    pub fn new(model: Arc<EntityModel>, settings: PathSettings) -> Self {
        Self { model, settings }
    }

    pub fn model(&self) -> &Arc<EntityModel> {
        &self.model
    }

    pub fn settings(&self) -> &PathSettings {
        &self.settings
    }

    /// Tokenize and resolve an absolute path such as `/Things(1)/Datastreams`.
    pub fn resolve(&self, path: &str) -> Result<ResolvedPath, InvalidUrlError> {
        let (stripped, shift) = self.settings.strip_version_prefix(path);
        let tokens = tokenize(stripped).map_err(|e| e.within(path, shift))?;
        match self.resolve_tokens(path, &tokens, None) {
            Ok(resolved) => {
                tracing::trace!(path, resolved = %resolved, "resolved path");
                Ok(resolved)
            }
            Err(err) => {
                tracing::debug!(path, error = %err, "rejected path");
                Err(err)
            }
        }
    }

    /// Resolve a token stream.
    ///
    /// With `root = None` the first name must be a root collection. With
    /// `root = Some(type)` the path is relative: the first name is a navigation
    /// of `type`. `path` is only used in error messages.
    pub fn resolve_tokens(
        &self,
        path: &str,
        tokens: &[Token],
        root: Option<&str>,
    ) -> Result<ResolvedPath, InvalidUrlError> {
        let mut context: Option<String> = match root {
            Some(root) => Some(
                self.model
                    .describe(root)
                    .map_err(|_| InvalidUrlError::UnknownCollection {
                        path: path.to_string(),
                        name: root.to_string(),
                    })?
                    .name
                    .clone(),
            ),
            None => None,
        };

        // Outermost first while walking; reversed at the end.
        let mut outward: Vec<PathSegment> = Vec::new();
        let mut property: Option<String> = None;
        let mut modifier: Option<PathModifier> = None;
        let mut named = 0usize;

        let mut iter = tokens.iter().peekable();
        while let Some(token) = iter.next() {
            if let Some(modifier) = modifier {
                return Err(InvalidUrlError::MisplacedModifier {
                    path: path.to_string(),
                    modifier: modifier.to_string(),
                });
            }

            let name = match token {
                Token::Modifier(m) => {
                    modifier = Some(*m);
                    continue;
                }
                Token::Identifier(_) => {
                    return Err(InvalidUrlError::syntax(
                        path,
                        0,
                        "identifier without a preceding segment",
                    ))
                }
                Token::Segment(name) | Token::PropertySuffix(name) => name,
            };

            if let Some(property) = &property {
                return Err(InvalidUrlError::PropertyNotTerminal {
                    path: path.to_string(),
                    name: property.clone(),
                });
            }

            named += 1;
            if named > self.settings.max_segments {
                return Err(InvalidUrlError::TooManySegments {
                    path: path.to_string(),
                    max: self.settings.max_segments,
                });
            }

            let identifier = match iter.peek() {
                Some(Token::Identifier(id)) => {
                    let id = id.clone();
                    iter.next();
                    Some(id)
                }
                _ => None,
            };

            // A known property of the previous entity addresses that property.
            if let Some(owner) = outward.last() {
                let is_property = self
                    .model
                    .describe(&owner.entity_type)
                    .map(|desc| desc.property(name).is_some())
                    .unwrap_or(false);
                if is_property {
                    if identifier.is_some() {
                        return Err(InvalidUrlError::UnexpectedIdentifier {
                            path: path.to_string(),
                            name: name.clone(),
                        });
                    }
                    if !owner.addresses_entity() {
                        return Err(InvalidUrlError::PropertyOfCollection {
                            path: path.to_string(),
                            name: name.clone(),
                        });
                    }
                    property = Some(name.clone());
                    continue;
                }
            }

            let mut segment = self.navigate(path, context.as_deref(), name)?;

            if let Some(previous) = outward.last() {
                if !previous.addresses_entity() {
                    return Err(InvalidUrlError::MissingIdentifier {
                        path: path.to_string(),
                        name: previous.navigation.clone(),
                    });
                }
            }
            if segment.multiplicity == Multiplicity::One && identifier.is_some() {
                return Err(InvalidUrlError::UnexpectedIdentifier {
                    path: path.to_string(),
                    name: name.clone(),
                });
            }

            segment.identifier = identifier;
            context = Some(segment.entity_type.clone());
            outward.push(segment);
        }

        let Some(last) = outward.last_mut() else {
            return Err(InvalidUrlError::syntax(path, 0, "path addresses nothing"));
        };

        let path_type = if property.is_some() {
            PathType::Property
        } else if last.addresses_entity() {
            PathType::Entity
        } else {
            PathType::Collection
        };
        last.property_name = property;

        match (modifier, path_type) {
            (Some(PathModifier::Ref), PathType::Property)
            | (Some(PathModifier::Value), PathType::Collection | PathType::Entity) => {
                return Err(InvalidUrlError::MisplacedModifier {
                    path: path.to_string(),
                    modifier: modifier.map(|m| m.to_string()).unwrap_or_default(),
                });
            }
            _ => {}
        }

        outward.reverse();
        Ok(ResolvedPath::new(outward, path_type, modifier))
    }

    fn navigate(
        &self,
        path: &str,
        context: Option<&str>,
        name: &str,
    ) -> Result<PathSegment, InvalidUrlError> {
        match context {
            None => {
                let desc = self.model.root_collection(name).ok_or_else(|| {
                    InvalidUrlError::UnknownCollection {
                        path: path.to_string(),
                        name: name.to_string(),
                    }
                })?;
                Ok(PathSegment {
                    collection_name: desc.collection.clone(),
                    navigation: name.to_string(),
                    entity_type: desc.name.clone(),
                    identifier: None,
                    property_name: None,
                    multiplicity: Multiplicity::Many,
                })
            }
            Some(entity_type) => {
                let edge = self
                    .model
                    .resolve_relation(entity_type, name)
                    .map_err(|_| InvalidUrlError::UnknownNavigation {
                        path: path.to_string(),
                        entity_type: entity_type.to_string(),
                        name: name.to_string(),
                    })?;
                Ok(PathSegment {
                    collection_name: edge.target_collection.clone(),
                    navigation: name.to_string(),
                    entity_type: edge.target.clone(),
                    identifier: None,
                    property_name: None,
                    multiplicity: edge.multiplicity,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> PathResolver {
        PathResolver::new(
            Arc::new(EntityModel::sensor_things().unwrap()),
            PathSettings::default(),
        )
    }

    #[test]
    fn relative_resolution_starts_from_root_type() {
        let r = resolver();
        let tokens = tokenize("/Datastreams(7)/Observations").unwrap();
        let resolved = r.resolve_tokens("Datastreams(7)/Observations", &tokens, Some("Thing")).unwrap();
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved.segments()[1].entity_type, "Datastream");
        assert_eq!(resolved.path_type(), PathType::Collection);

        let err = r.resolve_tokens("Sensor", &tokenize("/Sensor").unwrap(), Some("Thing"));
        assert!(matches!(err, Err(InvalidUrlError::UnknownNavigation { .. })));
    }

    #[test]
    fn version_prefix_is_transparent() {
        let r = resolver();
        assert_eq!(
            r.resolve("/v1.1/Things(1)/Datastreams").unwrap(),
            r.resolve("/Things(1)/Datastreams").unwrap()
        );
    }

    #[test]
    fn syntax_offset_is_relative_to_the_original_path() {
        let err = resolver().resolve("/v1.1/Things//x").unwrap_err();
        assert_eq!(
            err,
            InvalidUrlError::Syntax {
                path: "/v1.1/Things//x".to_string(),
                offset: 13,
                message: "empty path segment".to_string(),
            }
        );
    }

    #[test]
    fn too_many_segments() {
        let r = PathResolver::new(
            Arc::new(EntityModel::sensor_things().unwrap()),
            PathSettings {
                version_prefix: None,
                max_segments: 2,
            },
        );
        assert!(r.resolve("/Things(1)/Datastreams").is_ok());
        assert!(matches!(
            r.resolve("/Things(1)/Datastreams(2)/Observations"),
            Err(InvalidUrlError::TooManySegments { max: 2, .. })
        ));
    }
}
