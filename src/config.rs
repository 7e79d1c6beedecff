use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;

use crate::context::{BindingContext, PubSubConnection};
use crate::error::BridgeError;
use crate::properties::Properties;
use crate::route::TopicFilter;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    pub id: String,
    pub google_cloud_project_id: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MqttToPubSubBindingConfig {
    pub id: String,
    pub pubsub_connection: String,
    pub mqtt_topic_filters: Vec<String>,
    #[serde(default)]
    pub custom_settings: Properties,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PubSubToMqttBindingConfig {
    pub id: String,
    pub pubsub_connection: String,
    pub pubsub_subscriptions: Vec<String>,
    #[serde(default)]
    pub custom_settings: Properties,
}

/// Connections and bindings, as read by the configuration loader.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BridgeConfig {
    #[serde(default)]
    pub pubsub_connections: Vec<ConnectionConfig>,
    #[serde(default)]
    pub mqtt_to_pubsub_transformers: Vec<MqttToPubSubBindingConfig>,
    #[serde(default)]
    pub pubsub_to_mqtt_transformers: Vec<PubSubToMqttBindingConfig>,
}

impl BridgeConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, BridgeError> {
        let config: BridgeConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), BridgeError> {
        let mut connection_ids = HashSet::new();
        for connection in &self.pubsub_connections {
            if connection.id.is_empty() || connection.google_cloud_project_id.is_empty() {
                return Err(BridgeError::InvalidConfig(
                    "connection id and project id must not be empty".to_owned(),
                ));
            }
            if !connection_ids.insert(connection.id.as_str()) {
                return Err(BridgeError::InvalidConfig(format!(
                    "duplicate connection id `{}`",
                    connection.id
                )));
            }
        }

        let mut binding_ids = HashSet::new();
        let bindings = self
            .mqtt_to_pubsub_transformers
            .iter()
            .map(|b| (&b.id, &b.pubsub_connection))
            .chain(
                self.pubsub_to_mqtt_transformers
                    .iter()
                    .map(|b| (&b.id, &b.pubsub_connection)),
            );
        for (id, connection) in bindings {
            if !binding_ids.insert(id.as_str()) {
                return Err(BridgeError::InvalidConfig(format!(
                    "duplicate transformer id `{}`",
                    id
                )));
            }
            if !connection_ids.contains(connection.as_str()) {
                return Err(BridgeError::InvalidConfig(format!(
                    "transformer `{}` references unknown connection `{}`",
                    id, connection
                )));
            }
        }

        for binding in &self.mqtt_to_pubsub_transformers {
            if binding.mqtt_topic_filters.is_empty() {
                return Err(BridgeError::InvalidConfig(format!(
                    "transformer `{}` has no MQTT topic filters",
                    binding.id
                )));
            }
            for filter in &binding.mqtt_topic_filters {
                TopicFilter::new(filter)?;
            }
        }

        for binding in &self.pubsub_to_mqtt_transformers {
            if binding.pubsub_subscriptions.is_empty()
                || binding.pubsub_subscriptions.iter().any(String::is_empty)
            {
                return Err(BridgeError::InvalidConfig(format!(
                    "transformer `{}` needs non-empty subscription names",
                    binding.id
                )));
            }
        }
        Ok(())
    }

    pub fn connection(&self, id: &str) -> Option<PubSubConnection> {
        self.pubsub_connections
            .iter()
            .find(|c| c.id == id)
            .map(|c| PubSubConnection::new(&c.id, &c.google_cloud_project_id))
    }

    pub fn mqtt_to_pubsub(&self, id: &str) -> Option<&MqttToPubSubBindingConfig> {
        self.mqtt_to_pubsub_transformers.iter().find(|b| b.id == id)
    }

    pub fn pubsub_to_mqtt(&self, id: &str) -> Option<&PubSubToMqttBindingConfig> {
        self.pubsub_to_mqtt_transformers.iter().find(|b| b.id == id)
    }

    pub fn mqtt_to_pubsub_context(&self, id: &str) -> Result<Arc<BindingContext>, BridgeError> {
        let binding = self
            .mqtt_to_pubsub(id)
            .ok_or_else(|| BridgeError::InvalidConfig(format!("unknown transformer `{}`", id)))?;
        let connection = self.require_connection(&binding.pubsub_connection)?;
        Ok(BindingContext::new(
            &binding.id,
            connection,
            Vec::new(),
            binding.custom_settings.clone(),
        ))
    }

    pub fn pubsub_to_mqtt_context(&self, id: &str) -> Result<Arc<BindingContext>, BridgeError> {
        let binding = self
            .pubsub_to_mqtt(id)
            .ok_or_else(|| BridgeError::InvalidConfig(format!("unknown transformer `{}`", id)))?;
        let connection = self.require_connection(&binding.pubsub_connection)?;
        Ok(BindingContext::new(
            &binding.id,
            connection,
            binding.pubsub_subscriptions.clone(),
            binding.custom_settings.clone(),
        ))
    }

    fn require_connection(&self, id: &str) -> Result<PubSubConnection, BridgeError> {
        self.connection(id)
            .ok_or_else(|| BridgeError::InvalidConfig(format!("unknown connection `{}`", id)))
    }
}
