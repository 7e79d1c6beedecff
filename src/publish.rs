//!
//! MQTT side of the bridge: the PUBLISH packets handed over by the broker and the publishes
//! built by Pub/Sub to MQTT transformers.
//!
use bytes::Bytes;

use crate::builder::Origin;
use crate::error::{BridgeError, InvalidArgument, InvalidState};
use crate::properties::Properties;

pub const MAX_TOPIC_BYTES: usize = 65_535;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Qos {
    #[default]
    AtMostOnce = 0,
    AtLeastOnce = 1,
    ExactlyOnce = 2,
}

impl TryFrom<u8> for Qos {
    type Error = InvalidArgument;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        match level {
            0 => Ok(Qos::AtMostOnce),
            1 => Ok(Qos::AtLeastOnce),
            2 => Ok(Qos::ExactlyOnce),
            other => Err(InvalidArgument::Qos(other)),
        }
    }
}

/// Topic names may not be empty, may not contain wildcards and may not contain U+0000.
pub(crate) fn check_mqtt_topic(topic: &str) -> Result<(), InvalidArgument> {
    let valid = !topic.is_empty()
        && topic.len() <= MAX_TOPIC_BYTES
        && !topic.contains(['+', '#', '\u{0}']);
    match valid {
        true => Ok(()),
        false => Err(InvalidArgument::MqttTopic(topic.to_owned())),
    }
}

/// PUBLISH packet that arrived at the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishPacket {
    pub topic: String,
    pub qos: Qos,
    pub retain: bool,
    pub payload: Option<Bytes>,
    pub user_properties: Properties,
}

impl PublishPacket {
    pub fn new(topic: &str, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.to_owned(),
            qos: Qos::default(),
            retain: false,
            payload: Some(payload.into()),
            user_properties: Properties::new(),
        }
    }
}

/// Publish the broker sends to its subscribers. Only [`PublishBuilder::build`] creates one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publish {
    topic: String,
    qos: Qos,
    retain: bool,
    payload: Option<Bytes>,
    user_properties: Properties,
    content_type: Option<String>,
    response_topic: Option<String>,
    correlation_data: Option<Bytes>,
    message_expiry_interval: Option<u64>,
    pub(crate) origin: Option<Origin>,
}

impl Publish {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn qos(&self) -> Qos {
        self.qos
    }

    pub fn retain(&self) -> bool {
        self.retain
    }

    pub fn payload(&self) -> Option<&Bytes> {
        self.payload.as_ref()
    }

    pub fn user_properties(&self) -> &Properties {
        &self.user_properties
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn response_topic(&self) -> Option<&str> {
        self.response_topic.as_deref()
    }

    pub fn correlation_data(&self) -> Option<&Bytes> {
        self.correlation_data.as_ref()
    }

    /// Seconds.
    pub fn message_expiry_interval(&self) -> Option<u64> {
        self.message_expiry_interval
    }
}

#[derive(Debug, Clone, Default)]
pub struct PublishBuilder {
    topic: Option<String>,
    qos: Qos,
    retain: bool,
    payload: Option<Bytes>,
    user_properties: Properties,
    content_type: Option<String>,
    response_topic: Option<String>,
    correlation_data: Option<Bytes>,
    message_expiry_interval: Option<u64>,
    origin: Option<Origin>,
}

impl PublishBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_origin(origin: Origin) -> Self {
        Self {
            origin: Some(origin),
            ..Default::default()
        }
    }

    pub fn topic(&mut self, topic: &str) -> Result<&mut Self, BridgeError> {
        check_mqtt_topic(topic)?;
        self.topic = Some(topic.to_owned());
        Ok(self)
    }

    pub fn qos(&mut self, qos: Qos) -> &mut Self {
        self.qos = qos;
        self
    }

    pub fn retain(&mut self, retain: bool) -> &mut Self {
        self.retain = retain;
        self
    }

    pub fn payload(&mut self, payload: impl Into<Bytes>) -> &mut Self {
        self.payload = Some(payload.into());
        self
    }

    /// Append a user property. Names may repeat.
    pub fn user_property(&mut self, name: &str, value: &str) -> &mut Self {
        self.user_properties.push(name, value);
        self
    }

    pub fn content_type(&mut self, content_type: &str) -> &mut Self {
        self.content_type = Some(content_type.to_owned());
        self
    }

    pub fn response_topic(&mut self, topic: &str) -> Result<&mut Self, BridgeError> {
        check_mqtt_topic(topic)?;
        self.response_topic = Some(topic.to_owned());
        Ok(self)
    }

    pub fn correlation_data(&mut self, data: impl Into<Bytes>) -> &mut Self {
        self.correlation_data = Some(data.into());
        self
    }

    pub fn message_expiry_interval(&mut self, seconds: u64) -> &mut Self {
        self.message_expiry_interval = Some(seconds);
        self
    }

    pub fn build(&self) -> Result<Publish, BridgeError> {
        let topic = self.topic.clone().ok_or(InvalidState::MissingTopic)?;
        Ok(Publish {
            topic,
            qos: self.qos,
            retain: self.retain,
            payload: self.payload.clone(),
            user_properties: self.user_properties.clone(),
            content_type: self.content_type.clone(),
            response_topic: self.response_topic.clone(),
            correlation_data: self.correlation_data.clone(),
            message_expiry_interval: self.message_expiry_interval,
            origin: self.origin,
        })
    }
}
