//!
//! Protobuf encoding of Pub/Sub publish requests.
//!
//! Pub/Sub limits a publish request to 10MB on the wire, so message size checks have to
//! account for field tags and length prefixes, not only the raw data.
//!
use bytes::Bytes;
use prost::Message;
use std::collections::HashMap;

use crate::attributes::Attributes;
use crate::message::OutboundMessage;

pub const MAX_REQUEST_BYTES: usize = 10_000_000;

/// `google.pubsub.v1.PubsubMessage`, restricted to the fields a publisher sets.
#[derive(Clone, PartialEq, Message)]
pub struct PubsubMessage {
    #[prost(bytes = "bytes", tag = "1")]
    pub data: Bytes,
    #[prost(map = "string, string", tag = "2")]
    pub attributes: HashMap<String, String>,
    #[prost(string, tag = "5")]
    pub ordering_key: String,
}

/// `google.pubsub.v1.PublishRequest`.
#[derive(Clone, PartialEq, Message)]
pub struct PublishRequest {
    #[prost(string, tag = "1")]
    pub topic: String,
    #[prost(message, repeated, tag = "2")]
    pub messages: Vec<PubsubMessage>,
}

impl PubsubMessage {
    pub(crate) fn from_parts(
        data: Option<&Bytes>,
        attributes: &Attributes,
        ordering_key: Option<&str>,
    ) -> Self {
        Self {
            data: data.cloned().unwrap_or_default(),
            attributes: attributes.as_map(),
            ordering_key: ordering_key.unwrap_or_default().to_owned(),
        }
    }
}

impl From<&OutboundMessage> for PubsubMessage {
    fn from(message: &OutboundMessage) -> Self {
        Self::from_parts(
            message.data(),
            message.attributes(),
            message.ordering_key(),
        )
    }
}

/// Fully qualified topic path, `projects/{project}/topics/{topic}`.
pub fn topic_path(project_id: &str, topic_name: &str) -> String {
    format!("projects/{}/topics/{}", project_id, topic_name)
}

/// Publish request carrying `message` alone.
pub fn publish_request(topic_path: &str, message: &OutboundMessage) -> PublishRequest {
    PublishRequest {
        topic: topic_path.to_owned(),
        messages: vec![message.into()],
    }
}

/// Encoded size of a single-message publish request for `message`.
pub fn encoded_len(topic_path: &str, message: &OutboundMessage) -> usize {
    publish_request(topic_path, message).encoded_len()
}

/// Encode a single-message publish request.
pub fn encode(topic_path: &str, message: &OutboundMessage) -> Bytes {
    Bytes::from(publish_request(topic_path, message).encode_to_vec())
}
