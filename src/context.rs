//!
//! This module defines the read-only identity a transformer is bound to.
//!
use crate::properties::Properties;
use std::sync::Arc;

/// A configured Pub/Sub connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PubSubConnection {
    id: String,
    project_id: String,
}

impl PubSubConnection {
    pub fn new(id: &str, project_id: &str) -> Self {
        Self {
            id: id.to_owned(),
            project_id: project_id.to_owned(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }
}

/// Everything a single binding knows about itself. Created once, then shared by every
/// invocation of the binding's transformer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingContext {
    binding_id: String,
    connection: PubSubConnection,
    subscriptions: Vec<String>,
    custom_settings: Properties,
}

impl BindingContext {
    pub fn new(
        binding_id: &str,
        connection: PubSubConnection,
        subscriptions: Vec<String>,
        custom_settings: Properties,
    ) -> Arc<Self> {
        Arc::new(Self {
            binding_id: binding_id.to_owned(),
            connection,
            subscriptions,
            custom_settings,
        })
    }

    pub fn binding_id(&self) -> &str {
        &self.binding_id
    }

    pub fn connection(&self) -> &PubSubConnection {
        &self.connection
    }

    /// Subscriptions the binding consumes. Empty for MQTT to Pub/Sub bindings.
    pub fn subscriptions(&self) -> &[String] {
        &self.subscriptions
    }

    pub fn custom_settings(&self) -> &Properties {
        &self.custom_settings
    }
}
