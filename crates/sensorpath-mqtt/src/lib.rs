//! # SensorThings MQTT subscriptions
//!
//! Parses subscription topics (`v1.1/Things(1)/Datastreams`,
//! `Observations?$filter=result gt 5`) into [`Subscription`]s and decides,
//! for each entity change reported by storage, which live topics should
//! receive it.
//!
//! ```no_run
//! use sensorpath_model::EntityModel;
//! use sensorpath_mqtt::{ChangeEvent, MatcherConfig, SubscriptionMatcher};
//! use sensorpath_filter::EntitySnapshot;
//! use std::sync::Arc;
//!
//! let model = Arc::new(EntityModel::sensor_things().unwrap());
//! let matcher = SubscriptionMatcher::new(model, MatcherConfig::default());
//! matcher.subscribe("client-1", "v1.1/Things(1)/Datastreams").unwrap();
//!
//! let event = ChangeEvent::created(EntitySnapshot::new("Datastream", "7"))
//!     .with_related("Thing", "1");
//! for hit in matcher.match_event(&event) {
//!     println!("publish on {}", hit.topic);
//! }
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod matcher;
pub mod subscription;
pub mod topic;

pub use config::MatcherConfig;
pub use error::SubscriptionError;
pub use event::{ChangeEvent, EntityRef, RelatedEntity};
pub use matcher::{Match, SubscriptionMatcher};
pub use subscription::{Subscription, SubscriptionKind};
pub use topic::{parse_topic, TopicRequest};
