//!
//! Contracts between the bridge and user supplied transformers.
//!
//! A transformer is initialized once per binding and then called for every triggering event,
//! possibly from several threads at the same time. Each call receives its own input and output.
//!
use std::sync::Arc;

use crate::builder::{Origin, OutboundMessageBuilder};
use crate::context::{BindingContext, PubSubConnection};
use crate::error::{BridgeError, TransformError};
use crate::message::{InboundMessage, OutboundMessage};
use crate::properties::Properties;
use crate::publish::{Publish, PublishBuilder, PublishPacket};

/// Input of [`MqttToPubSubTransformer::init`] and [`PubSubToMqttTransformer::init`].
#[derive(Debug)]
pub struct TransformerInitInput {
    context: Arc<BindingContext>,
}

impl TransformerInitInput {
    pub(crate) fn new(context: Arc<BindingContext>) -> Self {
        Self { context }
    }

    pub fn connection(&self) -> &PubSubConnection {
        self.context.connection()
    }

    pub fn custom_settings(&self) -> &Properties {
        self.context.custom_settings()
    }

    pub fn context(&self) -> &BindingContext {
        &self.context
    }
}

pub trait MqttToPubSubTransformer: Send + Sync {
    /// Called once before the first event. Does nothing unless overridden.
    fn init(&mut self, input: &TransformerInitInput) -> Result<(), TransformError> {
        let _ = input;
        Ok(())
    }

    /// Called for every MQTT PUBLISH matching the binding's topic filters.
    fn transform_mqtt_to_pubsub(
        &self,
        input: &MqttToPubSubInput,
        output: &mut MqttToPubSubOutput,
    ) -> Result<(), TransformError>;
}

pub trait PubSubToMqttTransformer: Send + Sync {
    /// Called once before the first event. Does nothing unless overridden.
    fn init(&mut self, input: &TransformerInitInput) -> Result<(), TransformError> {
        let _ = input;
        Ok(())
    }

    /// Called for every message pulled from one of the binding's subscriptions. If no
    /// publishes are set, the message is ignored.
    fn transform_pubsub_to_mqtt(
        &self,
        input: &PubSubToMqttInput,
        output: &mut PubSubToMqttOutput,
    ) -> Result<(), TransformError>;
}

/// Adapts a closure into a transformer without an init step.
pub struct FnTransformer<F>(F);

pub fn mqtt_to_pubsub_fn<F>(f: F) -> FnTransformer<F>
where
    F: Fn(&MqttToPubSubInput, &mut MqttToPubSubOutput) -> Result<(), TransformError>
        + Send
        + Sync,
{
    FnTransformer(f)
}

pub fn pubsub_to_mqtt_fn<F>(f: F) -> FnTransformer<F>
where
    F: Fn(&PubSubToMqttInput, &mut PubSubToMqttOutput) -> Result<(), TransformError>
        + Send
        + Sync,
{
    FnTransformer(f)
}

impl<F> MqttToPubSubTransformer for FnTransformer<F>
where
    F: Fn(&MqttToPubSubInput, &mut MqttToPubSubOutput) -> Result<(), TransformError>
        + Send
        + Sync,
{
    fn transform_mqtt_to_pubsub(
        &self,
        input: &MqttToPubSubInput,
        output: &mut MqttToPubSubOutput,
    ) -> Result<(), TransformError> {
        (self.0)(input, output)
    }
}

impl<F> PubSubToMqttTransformer for FnTransformer<F>
where
    F: Fn(&PubSubToMqttInput, &mut PubSubToMqttOutput) -> Result<(), TransformError>
        + Send
        + Sync,
{
    fn transform_pubsub_to_mqtt(
        &self,
        input: &PubSubToMqttInput,
        output: &mut PubSubToMqttOutput,
    ) -> Result<(), TransformError> {
        (self.0)(input, output)
    }
}

#[derive(Debug)]
pub struct MqttToPubSubInput {
    packet: PublishPacket,
    context: Arc<BindingContext>,
}

impl MqttToPubSubInput {
    pub(crate) fn new(packet: PublishPacket, context: Arc<BindingContext>) -> Self {
        Self { packet, context }
    }

    /// The PUBLISH that triggered this call.
    pub fn publish_packet(&self) -> &PublishPacket {
        &self.packet
    }

    pub fn connection(&self) -> &PubSubConnection {
        self.context.connection()
    }

    pub fn context(&self) -> &BindingContext {
        &self.context
    }
}

#[derive(Debug)]
pub struct PubSubToMqttInput {
    message: InboundMessage,
    context: Arc<BindingContext>,
}

impl PubSubToMqttInput {
    pub(crate) fn new(message: InboundMessage, context: Arc<BindingContext>) -> Self {
        Self { message, context }
    }

    /// The Pub/Sub message that triggered this call.
    pub fn inbound_message(&self) -> &InboundMessage {
        &self.message
    }

    pub fn connection(&self) -> &PubSubConnection {
        self.context.connection()
    }

    pub fn context(&self) -> &BindingContext {
        &self.context
    }
}

// Last call wins, except that an element from another origin poisons the whole invocation.
#[derive(Debug)]
struct Collected<T> {
    origin: Origin,
    items: Vec<T>,
    foreign: bool,
}

impl<T> Collected<T> {
    fn new() -> Self {
        Self {
            origin: Origin::next(),
            items: Vec::new(),
            foreign: false,
        }
    }

    fn set(
        &mut self,
        items: Vec<T>,
        origin_of: impl Fn(&T) -> Option<Origin>,
    ) -> Result<(), BridgeError> {
        if items.iter().any(|item| origin_of(item) != Some(self.origin)) {
            self.foreign = true;
            self.items.clear();
            return Err(BridgeError::ForeignOrigin);
        }
        self.items = items;
        Ok(())
    }

    fn take(self) -> Result<Vec<T>, BridgeError> {
        if self.foreign {
            return Err(BridgeError::ForeignOrigin);
        }
        Ok(self.items)
    }
}

/// Collects the messages that are pushed to Pub/Sub once the transformer returns.
#[derive(Debug)]
pub struct MqttToPubSubOutput {
    collected: Collected<OutboundMessage>,
    project_id: String,
}

impl MqttToPubSubOutput {
    pub(crate) fn new(project_id: &str) -> Self {
        Self {
            collected: Collected::new(),
            project_id: project_id.to_owned(),
        }
    }

    /// Empty builder whose messages this output accepts. One builder can build many messages.
    pub fn new_message_builder(&self) -> OutboundMessageBuilder {
        OutboundMessageBuilder::with_origin(self.collected.origin, &self.project_id)
    }

    /// Set the messages to push, in publish order. A message may occur several times. Each
    /// call replaces the previous one; an empty list or no call at all pushes nothing.
    ///
    /// # Errors
    /// `BridgeError::ForeignOrigin` if any message was not built by a builder of this output.
    /// Nothing is pushed for this invocation afterwards.
    pub fn set_messages(&mut self, messages: Vec<OutboundMessage>) -> Result<(), BridgeError> {
        self.collected.set(messages, |m| m.origin)
    }

    pub(crate) fn take(self) -> Result<Vec<OutboundMessage>, BridgeError> {
        self.collected.take()
    }
}

/// Collects the publishes the broker sends once the transformer returns.
#[derive(Debug)]
pub struct PubSubToMqttOutput {
    collected: Collected<Publish>,
}

impl PubSubToMqttOutput {
    pub(crate) fn new() -> Self {
        Self {
            collected: Collected::new(),
        }
    }

    pub fn new_publish_builder(&self) -> PublishBuilder {
        PublishBuilder::with_origin(self.collected.origin)
    }

    /// Set the publishes, in publish order. Same rules as [`MqttToPubSubOutput::set_messages`].
    pub fn set_publishes(&mut self, publishes: Vec<Publish>) -> Result<(), BridgeError> {
        self.collected.set(publishes, |p| p.origin)
    }

    pub(crate) fn take(self) -> Result<Vec<Publish>, BridgeError> {
        self.collected.take()
    }
}
