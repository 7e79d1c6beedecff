//! This crate provides the contract between an MQTT broker and Google Cloud Pub/Sub: validated
//! builders for the messages crossing the boundary and dispatchers that run user supplied
//! transformers in either direction.
//!
//! Network transport, subscription polling and acknowledgement are left to the embedding
//! application, which hands events to a [`route::Router`] and drains its
//! [`publisher::Publisher`].
pub mod attributes;
pub mod builder;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod message;
pub mod properties;
pub mod publish;
pub mod publisher;
pub mod route;
pub mod transformer;
pub mod wire;
