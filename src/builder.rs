//!
//! Validating builder for messages pushed to Pub/Sub.
//!
use bytes::Bytes;
use std::sync::atomic::{self, Ordering};

use crate::attributes::Attributes;
use crate::error::{BridgeError, InvalidArgument, InvalidState};
use crate::message::OutboundMessage;
use crate::wire;
use prost::Message;

pub const MAX_DATA_BYTES: usize = 10_000_000;
pub const MAX_ORDERING_KEY_BYTES: usize = 1024;

/// Identifies the output a builder, and every message it builds, belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Origin(u64);

impl Origin {
    pub(crate) fn next() -> Self {
        static SEQUENCE: atomic::AtomicU64 = atomic::AtomicU64::new(1);
        Origin(SEQUENCE.fetch_add(1, Ordering::Relaxed))
    }
}

/// Character sets accepted by [`OutboundMessageBuilder::data_with_charset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    Utf8,
    Utf16Be,
    Utf16Le,
    Iso8859_1,
    UsAscii,
}

impl Charset {
    /// Characters the charset cannot represent are replaced by `?`.
    pub fn encode(&self, s: &str) -> Vec<u8> {
        match self {
            Charset::Utf8 => s.as_bytes().to_vec(),
            Charset::Utf16Be => s.encode_utf16().flat_map(u16::to_be_bytes).collect(),
            Charset::Utf16Le => s.encode_utf16().flat_map(u16::to_le_bytes).collect(),
            Charset::Iso8859_1 => narrow(s, 0xff),
            Charset::UsAscii => narrow(s, 0x7f),
        }
    }
}

fn narrow(s: &str, max: u32) -> Vec<u8> {
    s.chars()
        .map(|c| match c as u32 {
            code if code <= max => code as u8,
            _ => b'?',
        })
        .collect()
}

pub(crate) fn check_topic_name(name: &str) -> Result<(), InvalidArgument> {
    let valid = (3..=255).contains(&name.len())
        && name.starts_with(|c: char| c.is_ascii_alphabetic())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "._~+%-".contains(c))
        && !name.starts_with("goog");
    match valid {
        true => Ok(()),
        false => Err(InvalidArgument::TopicName(name.to_owned())),
    }
}

pub(crate) fn check_ordering_key(key: &str) -> Result<String, InvalidArgument> {
    if key.len() > MAX_ORDERING_KEY_BYTES {
        return Err(InvalidArgument::OrderingKeyTooLarge(key.len()));
    }
    Ok(key.to_owned())
}

/// Builder of [`OutboundMessage`]s.
///
/// Every setter validates its argument immediately. `build()` checks the invariants that span
/// several fields and returns a snapshot; the builder keeps its state and can be changed and
/// built again.
///
/// A builder obtained from `MqttToPubSubOutput::new_message_builder` stamps its messages with
/// that output's origin. Messages from a builder created with `new()` are accepted by no
/// output.
#[derive(Debug, Clone, Default)]
pub struct OutboundMessageBuilder {
    topic_name: Option<String>,
    data: Option<Bytes>,
    attributes: Attributes,
    ordering_key: Option<String>,
    origin: Option<Origin>,
    project_id: Option<String>,
}

impl OutboundMessageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_origin(origin: Origin, project_id: &str) -> Self {
        Self {
            origin: Some(origin),
            project_id: Some(project_id.to_owned()),
            ..Default::default()
        }
    }

    /// Set the topic name. Required.
    ///
    /// # Errors
    /// `InvalidArgument::TopicName` unless the name starts with a letter, has 3 to 255
    /// characters out of `[A-Za-z0-9._~+%-]` and does not start with `goog`.
    pub fn topic_name(&mut self, topic_name: &str) -> Result<&mut Self, BridgeError> {
        check_topic_name(topic_name)?;
        self.topic_name = Some(topic_name.to_owned());
        Ok(self)
    }

    /// Set the data from an owned or shared buffer. No copy is made.
    pub fn data(&mut self, data: impl Into<Bytes>) -> Result<&mut Self, BridgeError> {
        let data: Bytes = data.into();
        if data.len() > MAX_DATA_BYTES {
            return Err(InvalidArgument::DataTooLarge(data.len()).into());
        }
        self.data = Some(data);
        Ok(self)
    }

    /// Set the data from a borrowed slice, copying it.
    pub fn data_from_slice(&mut self, data: &[u8]) -> Result<&mut Self, BridgeError> {
        if data.len() > MAX_DATA_BYTES {
            return Err(InvalidArgument::DataTooLarge(data.len()).into());
        }
        self.data = Some(Bytes::copy_from_slice(data));
        Ok(self)
    }

    /// Set the data to the UTF-8 encoding of `data`.
    pub fn data_str(&mut self, data: &str) -> Result<&mut Self, BridgeError> {
        self.data_from_slice(data.as_bytes())
    }

    pub fn data_with_charset(
        &mut self,
        data: &str,
        charset: Charset,
    ) -> Result<&mut Self, BridgeError> {
        self.data(charset.encode(data))
    }

    /// Add an attribute, replacing the value of an existing key.
    pub fn attribute(&mut self, key: &str, value: &str) -> Result<&mut Self, BridgeError> {
        self.attributes.insert(key, value)?;
        Ok(self)
    }

    /// Add all `attributes`. Nothing is added if any entry is rejected.
    pub fn attributes<'a, I>(&mut self, attributes: I) -> Result<&mut Self, BridgeError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        self.attributes.extend(attributes)?;
        Ok(self)
    }

    pub fn ordering_key(&mut self, ordering_key: &str) -> Result<&mut Self, BridgeError> {
        self.ordering_key = Some(check_ordering_key(ordering_key)?);
        Ok(self)
    }

    /// Snapshot the current state into a new message.
    ///
    /// # Errors
    /// - `InvalidState::MissingTopic` if no topic name was set.
    /// - `InvalidState::EmptyMessage` if no data was set and the attributes are empty.
    /// - `InvalidState::RequestTooLarge` if the encoded publish request would exceed 10MB.
    pub fn build(&self) -> Result<OutboundMessage, BridgeError> {
        let topic_name = self.topic_name.as_ref().ok_or(InvalidState::MissingTopic)?;
        if self.data.is_none() && self.attributes.is_empty() {
            return Err(InvalidState::EmptyMessage.into());
        }

        let topic = match &self.project_id {
            Some(project_id) => wire::topic_path(project_id, topic_name),
            None => topic_name.clone(),
        };
        let request = wire::PublishRequest {
            topic,
            messages: vec![wire::PubsubMessage::from_parts(
                self.data.as_ref(),
                &self.attributes,
                self.ordering_key.as_deref(),
            )],
        };
        let request_len = request.encoded_len();
        if request_len > wire::MAX_REQUEST_BYTES {
            return Err(InvalidState::RequestTooLarge(request_len).into());
        }

        Ok(OutboundMessage {
            topic_name: topic_name.clone(),
            data: self.data.clone(),
            attributes: self.attributes.clone(),
            ordering_key: self.ordering_key.clone(),
            origin: self.origin,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_names() {
        let valid = [
            "abc",
            "Sensors",
            "a.b_c~d+e%f-g",
            "goo",
            "gooG-topic",
            "Google",
        ];
        for name in valid.iter() {
            assert!(check_topic_name(name).is_ok(), "{}", name);
        }
        assert!(check_topic_name(&format!("a{}", "b".repeat(254))).is_ok());

        let long = format!("a{}", "b".repeat(255));
        let invalid = [
            "",
            "ab",
            "1abc",
            "_abc",
            "goog",
            "googtopic",
            "abc/def",
            "abc def",
            "äbc",
            long.as_str(),
        ];
        for name in invalid.iter() {
            assert_eq!(
                check_topic_name(name),
                Err(InvalidArgument::TopicName(name.to_string())),
                "{}",
                name
            );
        }
    }

    #[test]
    fn test_round_trip() -> Result<(), BridgeError> {
        let message = OutboundMessageBuilder::new()
            .topic_name("sensors")?
            .data_str("hello")?
            .attribute("k", "v")?
            .build()?;
        assert_eq!(
            message.data().map(|d| d.to_vec()),
            Some(vec![0x68, 0x65, 0x6c, 0x6c, 0x6f])
        );
        assert_eq!(message.attributes().len(), 1);
        assert_eq!(message.attributes().get("k"), Some("v"));
        assert_eq!(message.topic_name(), "sensors");
        assert_eq!(message.ordering_key(), None);
        Ok(())
    }

    #[test]
    fn test_missing_topic() -> Result<(), BridgeError> {
        let mut builder = OutboundMessageBuilder::new();
        builder.data_str("hello")?;
        assert_eq!(
            builder.build(),
            Err(BridgeError::InvalidState(InvalidState::MissingTopic))
        );
        Ok(())
    }

    #[test]
    fn test_empty_message() -> Result<(), BridgeError> {
        let mut builder = OutboundMessageBuilder::new();
        builder.topic_name("sensors")?;
        assert_eq!(
            builder.build(),
            Err(BridgeError::InvalidState(InvalidState::EmptyMessage))
        );
        // attributes alone are enough
        builder.attribute("k", "v")?;
        let message = builder.build()?;
        assert!(message.data().is_none());
        Ok(())
    }

    #[test]
    fn test_invalid_topic_keeps_previous() -> Result<(), BridgeError> {
        let mut builder = OutboundMessageBuilder::new();
        builder.topic_name("sensors")?;
        assert!(builder.topic_name("goog-reserved").is_err());
        let message = builder.data_str("x")?.build()?;
        assert_eq!(message.topic_name(), "sensors");
        Ok(())
    }

    #[test]
    fn test_snapshots_are_independent() -> Result<(), BridgeError> {
        let mut builder = OutboundMessageBuilder::new();
        builder.topic_name("sensors")?.data_str("one")?.attribute("k", "v")?;
        let first = builder.build()?;
        let second = builder.build()?;
        assert_eq!(first, second);

        builder
            .data_str("two")?
            .attribute("k", "w")?
            .ordering_key("key")?;
        let third = builder.build()?;
        assert_eq!(first.data().map(|d| &d[..]), Some(&b"one"[..]));
        assert_eq!(first.attributes().get("k"), Some("v"));
        assert_eq!(first.ordering_key(), None);
        assert_eq!(third.data().map(|d| &d[..]), Some(&b"two"[..]));
        assert_eq!(third.attributes().get("k"), Some("w"));
        assert_eq!(third.ordering_key(), Some("key"));
        Ok(())
    }

    #[test]
    fn test_key_too_large_is_atomic() -> Result<(), BridgeError> {
        let mut builder = OutboundMessageBuilder::new();
        builder.topic_name("sensors")?.attribute("a", "1")?;
        let key = "k".repeat(257);
        let result = builder.attributes(vec![("b", "2"), (key.as_str(), "3")]);
        assert!(matches!(
            result,
            Err(BridgeError::InvalidArgument(InvalidArgument::KeyTooLarge(257)))
        ));
        let message = builder.build()?;
        assert_eq!(message.attributes().len(), 1);
        assert_eq!(message.attributes().get("b"), None);
        Ok(())
    }

    #[test]
    fn test_data_too_large() -> Result<(), BridgeError> {
        let mut builder = OutboundMessageBuilder::new();
        let result = builder.data(vec![0u8; MAX_DATA_BYTES + 1]);
        assert!(matches!(
            result,
            Err(BridgeError::InvalidArgument(InvalidArgument::DataTooLarge(10_000_001)))
        ));
        let result = builder.data_from_slice(&vec![0u8; MAX_DATA_BYTES + 1]);
        assert!(result.is_err());
        builder.data(vec![0u8; MAX_DATA_BYTES])?;
        Ok(())
    }

    #[test]
    fn test_request_too_large() -> Result<(), BridgeError> {
        let mut builder = OutboundMessageBuilder::new();
        builder
            .topic_name("sensors")?
            .data(vec![0u8; MAX_DATA_BYTES])?;
        assert!(matches!(
            builder.build(),
            Err(BridgeError::InvalidState(InvalidState::RequestTooLarge(_)))
        ));
        builder.data(vec![0u8; MAX_DATA_BYTES - 100])?;
        builder.build()?;
        Ok(())
    }

    #[test]
    fn test_ordering_key_limit() {
        let mut builder = OutboundMessageBuilder::new();
        assert!(builder.ordering_key(&"o".repeat(1024)).is_ok());
        assert!(matches!(
            builder.ordering_key(&"o".repeat(1025)),
            Err(BridgeError::InvalidArgument(InvalidArgument::OrderingKeyTooLarge(1025)))
        ));
    }

    #[test]
    fn test_charsets() {
        assert_eq!(Charset::Utf8.encode("hé"), vec![0x68, 0xc3, 0xa9]);
        assert_eq!(Charset::Utf16Be.encode("hé"), vec![0x00, 0x68, 0x00, 0xe9]);
        assert_eq!(Charset::Utf16Le.encode("hé"), vec![0x68, 0x00, 0xe9, 0x00]);
        assert_eq!(Charset::Iso8859_1.encode("hé€"), vec![0x68, 0xe9, b'?']);
        assert_eq!(Charset::UsAscii.encode("hé"), vec![0x68, b'?']);
    }

    #[test]
    fn test_data_with_charset() -> Result<(), BridgeError> {
        let message = OutboundMessageBuilder::new()
            .topic_name("sensors")?
            .data_with_charset("hé", Charset::Iso8859_1)?
            .build()?;
        assert_eq!(message.data_to_vec(), Some(vec![0x68, 0xe9]));
        Ok(())
    }
}
