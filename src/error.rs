use thiserror::Error;

/// A setter received a value outside the bounds accepted by the bus or the broker.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidArgument {
    #[error("topic name `{0}` is not a valid Pub/Sub topic name")]
    TopicName(String),

    #[error("attribute key of {0} bytes exceeds the max size of 256 bytes")]
    KeyTooLarge(usize),

    #[error("attribute value of {0} bytes exceeds the max size of 1024 bytes")]
    ValueTooLarge(usize),

    #[error("{0} attributes exceed the max count of 100")]
    TooManyAttributes(usize),

    #[error("data of {0} bytes exceeds the max size of 10000000 bytes")]
    DataTooLarge(usize),

    #[error("ordering key of {0} bytes exceeds the max size of 1024 bytes")]
    OrderingKeyTooLarge(usize),

    #[error("`{0}` is not a valid MQTT topic name")]
    MqttTopic(String),

    #[error("`{0}` is not a valid MQTT topic filter")]
    MqttTopicFilter(String),

    #[error("QoS level {0} is not one of 0, 1 or 2")]
    Qos(u8),

    #[error("timestamp nanos {0} are outside 0..1000000000")]
    Nanos(i32),

    #[error("timestamp seconds {0} are outside years 0001 to 9999")]
    Seconds(i64),
}

/// Cross-field invariants that did not hold when `build()` was called.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidState {
    #[error("topic was not set")]
    MissingTopic,

    #[error("data was not set and attributes are empty")]
    EmptyMessage,

    #[error("request of {0} bytes exceeds the max size of 10000000 bytes")]
    RequestTooLarge(usize),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(#[from] InvalidArgument),

    #[error("Invalid state: {0}")]
    InvalidState(#[from] InvalidState),

    #[error("Output received an element that was not created by its own builder")]
    ForeignOrigin,

    #[error("Transformer of binding `{binding}` failed: {reason}")]
    TransformFault { binding: String, reason: String },

    #[error("Initialization of binding `{binding}` failed: {reason}")]
    InitFailed { binding: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Downstream publisher is closed")]
    PublisherClosed,
}

impl From<serde_json::Error> for BridgeError {
    fn from(e: serde_json::Error) -> Self {
        BridgeError::InvalidConfig(e.to_string())
    }
}

/// Error type user transformers return from their callbacks.
pub type TransformError = Box<dyn std::error::Error + Send + Sync>;
