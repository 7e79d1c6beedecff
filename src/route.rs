//!
//! This module defines Router to find the bindings a triggering event is routed to.
//!
use crate::config::BridgeConfig;
use crate::dispatch::{MqttToPubSubDispatcher, PubSubToMqttDispatcher};
use crate::error::{BridgeError, InvalidArgument};
use crate::message::{InboundMessage, OutboundMessage};
use crate::publish::{Publish, PublishPacket};
use crate::publisher::Publisher;
use crate::transformer::{MqttToPubSubTransformer, PubSubToMqttTransformer};
use std::sync::Arc;
use tracing::debug;

/// MQTT topic filter, e.g. `devices/+/status` or `devices/#`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicFilter {
    filter: String,
}

impl TopicFilter {
    pub fn new(filter: &str) -> Result<Self, InvalidArgument> {
        let levels: Vec<&str> = filter.split('/').collect();
        let last = levels.len() - 1;
        let valid = !filter.is_empty()
            && !filter.contains('\u{0}')
            && levels.iter().enumerate().all(|(i, level)| match *level {
                "#" => i == last,
                "+" => true,
                other => !other.contains(['+', '#']),
            });
        if !valid {
            return Err(InvalidArgument::MqttTopicFilter(filter.to_owned()));
        }
        Ok(Self {
            filter: filter.to_owned(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.filter
    }

    pub fn matches(&self, topic: &str) -> bool {
        // Wildcards at the first level never match topics starting with `$`
        if topic.starts_with('$') && self.filter.starts_with(['+', '#']) {
            return false;
        }

        let mut filter_levels = self.filter.split('/');
        let mut topic_levels = topic.split('/');
        loop {
            match (filter_levels.next(), topic_levels.next()) {
                (Some("#"), _) => return true,
                (Some("+"), Some(_)) => {}
                (Some(f), Some(t)) if f == t => {}
                (None, None) => return true,
                _ => return false,
            }
        }
    }
}

/// Routes triggering events to the bindings configured for them.
///
/// Bindings are added during startup; afterwards the router is shared read-only between
/// worker threads.
#[derive(Default)]
pub struct Router {
    outbound: Vec<(Vec<TopicFilter>, Arc<MqttToPubSubDispatcher>)>,
    inbound: Vec<Arc<PubSubToMqttDispatcher>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_mqtt_to_pubsub(
        &mut self,
        dispatcher: MqttToPubSubDispatcher,
        filters: &[String],
    ) -> Result<(), BridgeError> {
        let filters = filters
            .iter()
            .map(|f| TopicFilter::new(f))
            .collect::<Result<Vec<_>, _>>()?;
        self.outbound.push((filters, Arc::new(dispatcher)));
        Ok(())
    }

    /// The binding receives messages from the subscriptions listed in its context.
    pub fn add_pubsub_to_mqtt(&mut self, dispatcher: PubSubToMqttDispatcher) {
        self.inbound.push(Arc::new(dispatcher));
    }

    /// Initialize `transformer` for the configured binding `id` and route its topic filters
    /// to it. A binding whose initialization fails is not added.
    pub fn bind_mqtt_to_pubsub<T>(
        &mut self,
        config: &BridgeConfig,
        id: &str,
        transformer: T,
    ) -> Result<(), BridgeError>
    where
        T: MqttToPubSubTransformer + 'static,
    {
        let context = config.mqtt_to_pubsub_context(id)?;
        let filters = config
            .mqtt_to_pubsub(id)
            .map(|b| b.mqtt_topic_filters.clone())
            .unwrap_or_default();
        let dispatcher = MqttToPubSubDispatcher::new(transformer, context)?;
        self.add_mqtt_to_pubsub(dispatcher, &filters)
    }

    pub fn bind_pubsub_to_mqtt<T>(
        &mut self,
        config: &BridgeConfig,
        id: &str,
        transformer: T,
    ) -> Result<(), BridgeError>
    where
        T: PubSubToMqttTransformer + 'static,
    {
        let context = config.pubsub_to_mqtt_context(id)?;
        let dispatcher = PubSubToMqttDispatcher::new(transformer, context)?;
        self.add_pubsub_to_mqtt(dispatcher);
        Ok(())
    }

    /// Bindings with at least one filter matching the topic of `packet`.
    pub fn route_publish(&self, packet: &PublishPacket) -> Vec<Arc<MqttToPubSubDispatcher>> {
        self.outbound
            .iter()
            .filter(|(filters, _)| filters.iter().any(|f| f.matches(&packet.topic)))
            .map(|(_, dispatcher)| Arc::clone(dispatcher))
            .collect()
    }

    /// Bindings consuming the subscription `message` was pulled from.
    pub fn route_inbound(&self, message: &InboundMessage) -> Vec<Arc<PubSubToMqttDispatcher>> {
        self.inbound
            .iter()
            .filter(|d| {
                d.context()
                    .subscriptions()
                    .iter()
                    .any(|s| subscription_matches(s, message.subscription_name()))
            })
            .map(Arc::clone)
            .collect()
    }

    /// Messages of every matching binding, in binding order.
    pub fn dispatch_publish(&self, packet: &PublishPacket) -> Vec<OutboundMessage> {
        let bindings = self.route_publish(packet);
        if bindings.is_empty() {
            debug!(topic = %packet.topic, "No binding matches MQTT topic");
        }
        bindings
            .iter()
            .flat_map(|d| d.dispatch(packet.clone()))
            .collect()
    }

    pub fn dispatch_inbound(&self, message: &InboundMessage) -> Vec<Publish> {
        self.route_inbound(message)
            .iter()
            .flat_map(|d| d.dispatch(message.clone()))
            .collect()
    }

    /// Dispatch and hand the result downstream. Nothing is handed over for an empty result.
    pub fn forward_publish(
        &self,
        packet: &PublishPacket,
        publisher: &dyn Publisher<OutboundMessage>,
    ) -> Result<usize, BridgeError> {
        let messages = self.dispatch_publish(packet);
        let count = messages.len();
        if count > 0 {
            publisher.publish(messages)?;
        }
        Ok(count)
    }

    pub fn forward_inbound(
        &self,
        message: &InboundMessage,
        publisher: &dyn Publisher<Publish>,
    ) -> Result<usize, BridgeError> {
        let publishes = self.dispatch_inbound(message);
        let count = publishes.len();
        if count > 0 {
            publisher.publish(publishes)?;
        }
        Ok(count)
    }
}

// Configured names are short; Pub/Sub may report `projects/{p}/subscriptions/{name}`.
fn subscription_matches(configured: &str, received: &str) -> bool {
    configured == received
        || received
            .strip_suffix(configured)
            .is_some_and(|prefix| prefix.ends_with("/subscriptions/"))
}
