use sensorpath_filter::{FilterTranslator, InvalidQueryError, Predicate};
use sensorpath_path::{PathResolver, PathType, ResolvedPath};
use serde::Serialize;

use crate::config::MatcherConfig;
use crate::error::SubscriptionError;
use crate::event::{ChangeEvent, EntityRef};
use crate::topic::parse_topic;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionKind {
    /// Every new or changed member of a set.
    Collection,
    /// One entity.
    Entity,
    /// One property of one entity.
    Property,
}

impl From<PathType> for SubscriptionKind {
    fn from(path_type: PathType) -> Self {
        match path_type {
            PathType::Collection => SubscriptionKind::Collection,
            PathType::Entity => SubscriptionKind::Entity,
            PathType::Property => SubscriptionKind::Property,
        }
    }
}

/// A parsed topic. Immutable once built; changing a subscription means
/// replacing it.
#[derive(Debug, Clone, Serialize)]
pub struct Subscription {
    /// Publish topic, exactly as subscribed
    topic: String,
    path: ResolvedPath,
    kind: SubscriptionKind,
    /// Singular type name of the entities this topic publishes
    wanted_type: String,
    /// Addressed id for entity and property topics
    entity_id: Option<String>,
    property: Option<String>,
    /// Entity the topic navigates from, for `/Things(1)/Datastreams`
    source: Option<EntityRef>,
    /// Role leading from a published entity back to `source`
    via_role: Option<String>,
    filter: Option<Predicate>,
    filter_text: Option<String>,
    select: Vec<String>,
}

impl Subscription {
    /// Parses and validates `topic`. An explicit `filter` replaces one
    /// embedded in the topic's query.
    pub fn parse(
        topic: &str,
        filter: Option<&str>,
        resolver: &PathResolver,
        translator: &FilterTranslator,
        config: &MatcherConfig,
    ) -> Result<Self, SubscriptionError> {
        let request = parse_topic(topic)?;
        let path = resolver.resolve(&request.path)?;
        if path.modifier().is_some() {
            return Err(SubscriptionError::ModifierNotAllowed {
                topic: topic.to_string(),
            });
        }

        let kind = SubscriptionKind::from(path.path_type());
        if kind == SubscriptionKind::Property && !config.allow_property_topics {
            return Err(SubscriptionError::PropertyTopicsDisabled {
                topic: topic.to_string(),
            });
        }

        let model = resolver.model();
        let main = path.main();
        let descriptor = model
            .describe(&main.entity_type)
            .map_err(|_| InvalidQueryError::UnknownEntityType(main.entity_type.clone()))?;

        let filter_text = filter.map(str::to_string).or(request.filter);
        let filter = match &filter_text {
            Some(_) if kind != SubscriptionKind::Collection => {
                return Err(SubscriptionError::FilterNotAllowed {
                    topic: topic.to_string(),
                })
            }
            Some(text) => Some(translator.bind(&translator.parse(text)?, descriptor)?),
            None => None,
        };

        for name in &request.select {
            if descriptor.property(name).is_none() {
                return Err(InvalidQueryError::UnknownProperty {
                    entity_type: descriptor.name.clone(),
                    property: name.clone(),
                }
                .into());
            }
        }

        let (source, via_role) = match path.parent() {
            Some(parent) => {
                let id = parent
                    .identifier
                    .clone()
                    .ok_or_else(|| SubscriptionError::SourceNotIdentified {
                        topic: topic.to_string(),
                    })?;
                let edge = model
                    .resolve_relation(&parent.entity_type, &main.navigation)
                    .map_err(|_| InvalidQueryError::UnknownProperty {
                        entity_type: parent.entity_type.clone(),
                        property: main.navigation.clone(),
                    })?;
                (
                    Some(EntityRef::new(parent.entity_type.clone(), id)),
                    Some(edge.inverse.clone()),
                )
            }
            None => (None, None),
        };

        Ok(Self {
            topic: topic.to_string(),
            kind,
            wanted_type: main.entity_type.clone(),
            entity_id: main.identifier.clone(),
            property: main.property_name.clone(),
            source,
            via_role,
            filter,
            filter_text,
            select: request.select,
            path,
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn path(&self) -> &ResolvedPath {
        &self.path
    }

    pub fn kind(&self) -> SubscriptionKind {
        self.kind
    }

    pub fn wanted_type(&self) -> &str {
        &self.wanted_type
    }

    pub fn entity_id(&self) -> Option<&str> {
        self.entity_id.as_deref()
    }

    pub fn property(&self) -> Option<&str> {
        self.property.as_deref()
    }

    pub fn source(&self) -> Option<&EntityRef> {
        self.source.as_ref()
    }

    pub fn filter(&self) -> Option<&Predicate> {
        self.filter.as_ref()
    }

    pub fn filter_text(&self) -> Option<&str> {
        self.filter_text.as_deref()
    }

    pub fn select(&self) -> &[String] {
        &self.select
    }

    /// Whether `event` is published on this topic.
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if event.entity_type() != self.wanted_type {
            return false;
        }
        if let Some(id) = &self.entity_id {
            if event.id() != id {
                return false;
            }
        }
        if let Some(source) = &self.source {
            if !event.is_related_to(source, self.via_role.as_deref()) {
                return false;
            }
        }
        if let Some(property) = &self.property {
            if !event.touches(property) {
                return false;
            }
        }
        match &self.filter {
            Some(predicate) => predicate.evaluate(&event.entity),
            None => true,
        }
    }
}
