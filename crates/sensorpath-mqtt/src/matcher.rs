//! The live subscription set.
//!
//! The set is copy-on-write: writers swap in a new table under a short
//! write lock, while `match_event` clones the current `Arc` and iterates that
//! snapshot without holding any lock. A subscription added or removed during
//! a match is either fully visible to it or not at all.

use parking_lot::RwLock;
use sensorpath_filter::FilterTranslator;
use sensorpath_model::EntityModel;
use sensorpath_path::PathResolver;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, trace};

use crate::config::MatcherConfig;
use crate::error::SubscriptionError;
use crate::event::ChangeEvent;
use crate::subscription::Subscription;

/// A subscription selected for an event, with the topic to publish on.
#[derive(Debug, Clone)]
pub struct Match {
    pub subscription: Arc<Subscription>,
    pub topic: String,
}

#[derive(Debug, Clone)]
struct Entry {
    subscription: Arc<Subscription>,
    /// Clients holding the topic
    clients: BTreeSet<String>,
    /// Held by a direct `register` call
    registered: bool,
}

impl Entry {
    fn is_orphaned(&self) -> bool {
        !self.registered && self.clients.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
struct SubscriptionTable {
    by_topic: BTreeMap<String, Entry>,
}

pub struct SubscriptionMatcher {
    resolver: PathResolver,
    translator: FilterTranslator,
    config: MatcherConfig,
    table: RwLock<Arc<SubscriptionTable>>,
}

impl SubscriptionMatcher {
    pub fn new(model: Arc<EntityModel>, config: MatcherConfig) -> Self {
        Self {
            resolver: PathResolver::new(model.clone(), config.path.clone()),
            translator: FilterTranslator::new(model, config.filter.clone()),
            config,
            table: RwLock::new(Arc::new(SubscriptionTable::default())),
        }
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Parses a topic without adding it to the live set.
    pub fn parse(
        &self,
        topic: &str,
        filter: Option<&str>,
    ) -> Result<Subscription, SubscriptionError> {
        Subscription::parse(topic, filter, &self.resolver, &self.translator, &self.config)
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Adds (or replaces) the subscription for `topic`. Clients already
    /// holding the topic keep holding the replacement.
    pub fn register(
        &self,
        topic: &str,
        filter: Option<&str>,
    ) -> Result<Arc<Subscription>, SubscriptionError> {
        let subscription = Arc::new(self.parse(topic, filter)?);
        let count = self.update(|table| {
            let entry = table
                .by_topic
                .entry(topic.to_string())
                .or_insert_with(|| Entry {
                    subscription: subscription.clone(),
                    clients: BTreeSet::new(),
                    registered: true,
                });
            entry.subscription = subscription.clone();
            entry.registered = true;
        });
        debug!(topic = %topic, subscriptions = count, "registered subscription");
        Ok(subscription)
    }

    /// Drops a direct registration. Client references are unaffected.
    pub fn deregister(&self, topic: &str) -> bool {
        let mut found = false;
        let count = self.update(|table| {
            if let Some(entry) = table.by_topic.get_mut(topic) {
                found = entry.registered;
                entry.registered = false;
                if entry.is_orphaned() {
                    table.by_topic.remove(topic);
                }
            }
        });
        debug!(topic = %topic, found, subscriptions = count, "deregistered subscription");
        found
    }

    /// Adds a client reference to `topic`, creating the subscription on
    /// first use.
    pub fn subscribe(
        &self,
        client: &str,
        topic: &str,
    ) -> Result<Arc<Subscription>, SubscriptionError> {
        if let Some(entry) = self.snapshot().by_topic.get(topic) {
            let subscription = entry.subscription.clone();
            self.update(|table| {
                if let Some(entry) = table.by_topic.get_mut(topic) {
                    entry.clients.insert(client.to_string());
                }
            });
            // Lost a race with the last unsubscribe; start over.
            if self.holds(client, topic) {
                debug!(client = %client, topic = %topic, "joined existing subscription");
                return Ok(subscription);
            }
        }

        let created = Arc::new(self.parse(topic, None)?);
        let mut shared = created.clone();
        let count = self.update(|table| {
            let entry = table
                .by_topic
                .entry(topic.to_string())
                .or_insert_with(|| Entry {
                    subscription: created.clone(),
                    clients: BTreeSet::new(),
                    registered: false,
                });
            entry.clients.insert(client.to_string());
            shared = entry.subscription.clone();
        });
        debug!(client = %client, topic = %topic, subscriptions = count, "subscribed");
        Ok(shared)
    }

    /// Releases a client reference. Returns `false` when the client did not
    /// hold `topic`.
    pub fn unsubscribe(&self, client: &str, topic: &str) -> bool {
        let mut released = false;
        let count = self.update(|table| {
            if let Some(entry) = table.by_topic.get_mut(topic) {
                released = entry.clients.remove(client);
                if entry.is_orphaned() {
                    table.by_topic.remove(topic);
                }
            }
        });
        debug!(client = %client, topic = %topic, released, subscriptions = count, "unsubscribed");
        released
    }

    /// Releases every reference `client` holds; returns how many.
    pub fn disconnect(&self, client: &str) -> usize {
        let mut released = 0;
        let count = self.update(|table| {
            for entry in table.by_topic.values_mut() {
                if entry.clients.remove(client) {
                    released += 1;
                }
            }
            table.by_topic.retain(|_, entry| !entry.is_orphaned());
        });
        debug!(client = %client, released, subscriptions = count, "client disconnected");
        released
    }

    // ========================================================================
    // Matching
    // ========================================================================

    /// Every live subscription `event` should be published to, ordered by
    /// topic. Never fails; an event no subscription wants yields nothing.
    pub fn match_event(&self, event: &ChangeEvent) -> Vec<Match> {
        let snapshot = self.snapshot();
        snapshot
            .by_topic
            .values()
            .filter(|entry| entry.subscription.matches(event))
            .map(|entry| {
                trace!(
                    topic = %entry.subscription.topic(),
                    entity_type = %event.entity_type(),
                    id = %event.id(),
                    "subscription matched"
                );
                Match {
                    subscription: entry.subscription.clone(),
                    topic: entry.subscription.topic().to_string(),
                }
            })
            .collect()
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    pub fn len(&self) -> usize {
        self.snapshot().by_topic.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn topics(&self) -> Vec<String> {
        self.snapshot().by_topic.keys().cloned().collect()
    }

    pub fn get(&self, topic: &str) -> Option<Arc<Subscription>> {
        self.snapshot()
            .by_topic
            .get(topic)
            .map(|entry| entry.subscription.clone())
    }

    /// Whether `client` currently holds `topic`.
    pub fn holds(&self, client: &str, topic: &str) -> bool {
        self.snapshot()
            .by_topic
            .get(topic)
            .is_some_and(|entry| entry.clients.contains(client))
    }

    fn snapshot(&self) -> Arc<SubscriptionTable> {
        self.table.read().clone()
    }

    /// Applies `change` to the table, cloning it first if a match is still
    /// iterating the current one. Returns the new subscription count.
    fn update(&self, change: impl FnOnce(&mut SubscriptionTable)) -> usize {
        let mut guard = self.table.write();
        let table = Arc::make_mut(&mut guard);
        change(table);
        table.by_topic.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensorpath_filter::EntitySnapshot;

    fn matcher() -> SubscriptionMatcher {
        SubscriptionMatcher::new(
            Arc::new(EntityModel::sensor_things().unwrap()),
            MatcherConfig::default(),
        )
    }

    #[test]
    fn clients_share_one_subscription() {
        let m = matcher();
        let a = m.subscribe("a", "/Things").unwrap();
        let b = m.subscribe("b", "/Things").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(m.len(), 1);

        assert!(m.unsubscribe("a", "/Things"));
        assert!(!m.unsubscribe("a", "/Things"));
        assert_eq!(m.len(), 1);
        assert!(m.unsubscribe("b", "/Things"));
        assert!(m.is_empty());
    }

    #[test]
    fn disconnect_releases_everything() {
        let m = matcher();
        m.subscribe("a", "/Things").unwrap();
        m.subscribe("a", "/Sensors").unwrap();
        m.subscribe("b", "/Sensors").unwrap();
        assert_eq!(m.disconnect("a"), 2);
        assert_eq!(m.topics(), vec!["/Sensors".to_string()]);
        assert_eq!(m.disconnect("a"), 0);
    }

    #[test]
    fn registration_outlives_clients() {
        let m = matcher();
        m.register("/Things", None).unwrap();
        m.subscribe("a", "/Things").unwrap();
        m.disconnect("a");
        assert_eq!(m.len(), 1);
        assert!(m.deregister("/Things"));
        assert!(m.is_empty());
        assert!(!m.deregister("/Things"));
    }

    #[test]
    fn failed_registration_creates_nothing() {
        let m = matcher();
        assert!(m.register("/Gizmos", None).is_err());
        assert!(m.subscribe("a", "/Things(1)/Gizmos").is_err());
        assert!(m.is_empty());
    }

    #[test]
    fn replacing_a_registration_keeps_clients() {
        let m = matcher();
        m.subscribe("a", "/Observations").unwrap();
        m.register("/Observations", Some("result gt 10")).unwrap();
        assert!(m.holds("a", "/Observations"));

        let low = ChangeEvent::created(
            EntitySnapshot::new("Observation", "1").with_property("result", serde_json::json!(3)),
        );
        assert!(m.match_event(&low).is_empty());
    }

    #[test]
    fn snapshots_survive_concurrent_updates() {
        let m = matcher();
        m.subscribe("a", "/Things").unwrap();
        let before = m.snapshot();
        m.subscribe("a", "/Sensors").unwrap();
        m.disconnect("a");
        assert_eq!(before.by_topic.len(), 1);
        assert!(m.is_empty());
    }
}
