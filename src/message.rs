use crate::attributes::Attributes;
use crate::builder::Origin;
use crate::error::{BridgeError, InvalidArgument};
use bytes::Bytes;
use std::collections::HashMap;

/// Point in time as reported by Pub/Sub: seconds since epoch plus a nanosecond fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    seconds: i64,
    nanos: i32,
}

impl Timestamp {
    /// 0001-01-01T00:00:00Z
    pub const MIN_SECONDS: i64 = -62_135_596_800;
    /// 9999-12-31T23:59:59Z
    pub const MAX_SECONDS: i64 = 253_402_300_799;

    pub fn new(seconds: i64, nanos: i32) -> Result<Self, InvalidArgument> {
        if !(Self::MIN_SECONDS..=Self::MAX_SECONDS).contains(&seconds) {
            return Err(InvalidArgument::Seconds(seconds));
        }
        if !(0..1_000_000_000).contains(&nanos) {
            return Err(InvalidArgument::Nanos(nanos));
        }
        Ok(Self { seconds, nanos })
    }

    pub fn seconds(&self) -> i64 {
        self.seconds
    }

    pub fn nanos(&self) -> i32 {
        self.nanos
    }

    /// Milliseconds since epoch. Sub-millisecond precision is truncated.
    pub fn to_millis(&self) -> i64 {
        self.seconds * 1000 + i64::from(self.nanos / 1_000_000)
    }
}

/// Message to be pushed to Pub/Sub. Only `OutboundMessageBuilder::build` creates one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub(crate) topic_name: String,
    pub(crate) data: Option<Bytes>,
    pub(crate) attributes: Attributes,
    pub(crate) ordering_key: Option<String>,
    pub(crate) origin: Option<Origin>,
}

impl OutboundMessage {
    pub fn topic_name(&self) -> &str {
        &self.topic_name
    }

    /// Read-only view of the data. The buffer is shared, not copied.
    pub fn data(&self) -> Option<&Bytes> {
        self.data.as_ref()
    }

    /// Fresh copy of the data on every call.
    pub fn data_to_vec(&self) -> Option<Vec<u8>> {
        self.data.as_ref().map(|d| d.to_vec())
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn ordering_key(&self) -> Option<&str> {
        self.ordering_key.as_deref()
    }
}

/// Raw message as handed over by the subscription polling machinery.
#[derive(Debug, Clone, Default)]
pub struct ReceivedMessage {
    pub message_id: String,
    pub publish_time: (i64, i32),
    pub subscription_name: String,
    pub data: Bytes,
    pub attributes: HashMap<String, String>,
    pub ordering_key: String,
}

/// Message pulled from a Pub/Sub subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    subscription_name: String,
    message_id: String,
    publish_time: Timestamp,
    data: Option<Bytes>,
    attributes: Attributes,
    ordering_key: Option<String>,
}

impl TryFrom<ReceivedMessage> for InboundMessage {
    type Error = BridgeError;

    fn try_from(received: ReceivedMessage) -> Result<Self, Self::Error> {
        let (seconds, nanos) = received.publish_time;
        let attributes = Attributes::from_map(&received.attributes)?;
        let ordering_key = match received.ordering_key.is_empty() {
            true => None,
            false => Some(crate::builder::check_ordering_key(&received.ordering_key)?),
        };
        // Pub/Sub has no notion of a null payload, an empty one means "no data".
        let data = match received.data.is_empty() {
            true => None,
            false => Some(received.data),
        };
        Ok(InboundMessage {
            subscription_name: received.subscription_name,
            message_id: received.message_id,
            publish_time: Timestamp::new(seconds, nanos)?,
            data,
            attributes,
            ordering_key,
        })
    }
}

impl InboundMessage {
    pub fn subscription_name(&self) -> &str {
        &self.subscription_name
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn publish_time(&self) -> Timestamp {
        self.publish_time
    }

    pub fn data(&self) -> Option<&Bytes> {
        self.data.as_ref()
    }

    pub fn data_to_vec(&self) -> Option<Vec<u8>> {
        self.data.as_ref().map(|d| d.to_vec())
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn ordering_key(&self) -> Option<&str> {
        self.ordering_key.as_deref()
    }
}
