//!
//! Dispatchers invoke a binding's transformer for every triggering event and collect what it
//! produced.
//!
//! A dispatcher is shared by reference between any number of worker threads. A transformer
//! that fails, by returning an error or by panicking, only loses the output of its own
//! invocation.
//!
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::context::BindingContext;
use crate::error::{BridgeError, TransformError};
use crate::message::{InboundMessage, OutboundMessage};
use crate::publish::{Publish, PublishPacket};
use crate::transformer::{
    MqttToPubSubInput, MqttToPubSubOutput, MqttToPubSubTransformer, PubSubToMqttInput,
    PubSubToMqttOutput, PubSubToMqttTransformer, TransformerInitInput,
};

fn panic_reason(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        return (*s).to_owned();
    }
    if let Some(s) = payload.downcast_ref::<String>() {
        return s.clone();
    }
    "transformer panicked".to_owned()
}

// Runs a user callback, turning both errors and panics into a reason string.
fn guarded<F>(f: F) -> Result<(), String>
where
    F: FnOnce() -> Result<(), TransformError>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(payload) => Err(panic_reason(payload)),
    }
}

fn initialize<F>(context: &BindingContext, init: F) -> Result<(), BridgeError>
where
    F: FnOnce() -> Result<(), TransformError>,
{
    let binding = context.binding_id();
    match guarded(init) {
        Ok(()) => {
            info!(
                binding = %binding,
                connection = %context.connection().id(),
                "Transformer initialized"
            );
            Ok(())
        }
        Err(reason) => {
            error!(
                binding = %binding,
                %reason,
                "Transformer initialization failed, binding disabled"
            );
            Err(BridgeError::InitFailed {
                binding: binding.to_owned(),
                reason,
            })
        }
    }
}

fn invoke<F>(context: &BindingContext, f: F) -> Result<(), BridgeError>
where
    F: FnOnce() -> Result<(), TransformError>,
{
    guarded(f).map_err(|reason| BridgeError::TransformFault {
        binding: context.binding_id().to_owned(),
        reason,
    })
}

fn contain<T>(context: &BindingContext, result: Result<Vec<T>, BridgeError>) -> Vec<T> {
    match result {
        Ok(items) => {
            debug!(
                binding = %context.binding_id(),
                count = items.len(),
                "Transformer produced output"
            );
            items
        }
        Err(e) => {
            warn!(binding = %context.binding_id(), error = %e, "Transformer output discarded");
            Vec::new()
        }
    }
}

/// Dispatcher of one MQTT to Pub/Sub binding.
pub struct MqttToPubSubDispatcher {
    transformer: Box<dyn MqttToPubSubTransformer>,
    context: Arc<BindingContext>,
}

impl MqttToPubSubDispatcher {
    /// Initialize `transformer` and bind it to `context`.
    ///
    /// # Errors
    /// `BridgeError::InitFailed` if `init` returned an error or panicked. The binding must not
    /// be used and is not retried.
    pub fn new<T>(mut transformer: T, context: Arc<BindingContext>) -> Result<Self, BridgeError>
    where
        T: MqttToPubSubTransformer + 'static,
    {
        let init_input = TransformerInitInput::new(Arc::clone(&context));
        initialize(&context, || transformer.init(&init_input))?;
        Ok(Self {
            transformer: Box::new(transformer),
            context,
        })
    }

    pub fn context(&self) -> &Arc<BindingContext> {
        &self.context
    }

    /// Run the transformer for `packet` and return the messages to push, in order.
    pub fn try_dispatch(&self, packet: PublishPacket) -> Result<Vec<OutboundMessage>, BridgeError> {
        let input = MqttToPubSubInput::new(packet, Arc::clone(&self.context));
        let mut output = MqttToPubSubOutput::new(self.context.connection().project_id());
        invoke(&self.context, || {
            self.transformer.transform_mqtt_to_pubsub(&input, &mut output)
        })?;
        output.take()
    }

    /// Like [`try_dispatch`](Self::try_dispatch), but a failed invocation is logged and
    /// yields no messages.
    pub fn dispatch(&self, packet: PublishPacket) -> Vec<OutboundMessage> {
        contain(&self.context, self.try_dispatch(packet))
    }
}

/// Dispatcher of one Pub/Sub to MQTT binding.
pub struct PubSubToMqttDispatcher {
    transformer: Box<dyn PubSubToMqttTransformer>,
    context: Arc<BindingContext>,
}

impl PubSubToMqttDispatcher {
    pub fn new<T>(mut transformer: T, context: Arc<BindingContext>) -> Result<Self, BridgeError>
    where
        T: PubSubToMqttTransformer + 'static,
    {
        let init_input = TransformerInitInput::new(Arc::clone(&context));
        initialize(&context, || transformer.init(&init_input))?;
        Ok(Self {
            transformer: Box::new(transformer),
            context,
        })
    }

    pub fn context(&self) -> &Arc<BindingContext> {
        &self.context
    }

    pub fn try_dispatch(&self, message: InboundMessage) -> Result<Vec<Publish>, BridgeError> {
        let input = PubSubToMqttInput::new(message, Arc::clone(&self.context));
        let mut output = PubSubToMqttOutput::new();
        invoke(&self.context, || {
            self.transformer.transform_pubsub_to_mqtt(&input, &mut output)
        })?;
        output.take()
    }

    /// A failed invocation yields no publishes; the triggering message is then ignored.
    pub fn dispatch(&self, message: InboundMessage) -> Vec<Publish> {
        contain(&self.context, self.try_dispatch(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::PubSubConnection;
    use crate::message::ReceivedMessage;
    use crate::properties::Properties;
    use crate::transformer::{mqtt_to_pubsub_fn, pubsub_to_mqtt_fn};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn context(id: &str) -> Arc<BindingContext> {
        let mut settings = Properties::new();
        settings.push("target-topic", "sensors");
        BindingContext::new(
            id,
            PubSubConnection::new("gcp", "my-project"),
            vec!["orders".to_owned()],
            settings,
        )
    }

    fn inbound(id: &str, data: &'static str) -> InboundMessage {
        let received = ReceivedMessage {
            message_id: id.to_owned(),
            publish_time: (1, 0),
            subscription_name: "orders".to_owned(),
            data: data.into(),
            ..Default::default()
        };
        match InboundMessage::try_from(received) {
            Ok(message) => message,
            Err(e) => panic!("invalid test message: {}", e),
        }
    }

    struct Forwarder {
        topic: Option<String>,
        inits: Arc<AtomicUsize>,
    }

    impl MqttToPubSubTransformer for Forwarder {
        fn init(&mut self, input: &TransformerInitInput) -> Result<(), TransformError> {
            self.inits.fetch_add(1, Ordering::SeqCst);
            self.topic = input.custom_settings().get_first("target-topic").map(str::to_owned);
            Ok(())
        }

        fn transform_mqtt_to_pubsub(
            &self,
            input: &MqttToPubSubInput,
            output: &mut MqttToPubSubOutput,
        ) -> Result<(), TransformError> {
            let topic = self.topic.as_deref().ok_or("not initialized")?;
            let packet = input.publish_packet();
            let mut builder = output.new_message_builder();
            builder
                .topic_name(topic)?
                .attribute("mqtt-topic", &packet.topic)?;
            if let Some(payload) = &packet.payload {
                builder.data(payload.clone())?;
            }
            let message = builder.build()?;
            output.set_messages(vec![message])?;
            Ok(())
        }
    }

    #[test]
    fn test_init_once_then_dispatch() -> Result<(), BridgeError> {
        let inits = Arc::new(AtomicUsize::new(0));
        let transformer = Forwarder {
            topic: None,
            inits: Arc::clone(&inits),
        };
        let dispatcher = MqttToPubSubDispatcher::new(transformer, context("to-pubsub"))?;
        let first = dispatcher.try_dispatch(PublishPacket::new("devices/1", "hello"))?;
        let second = dispatcher.try_dispatch(PublishPacket::new("devices/2", "world"))?;
        assert_eq!(inits.load(Ordering::SeqCst), 1);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].topic_name(), "sensors");
        assert_eq!(first[0].attributes().get("mqtt-topic"), Some("devices/1"));
        assert_eq!(second[0].data().map(|d| &d[..]), Some(&b"world"[..]));
        Ok(())
    }

    #[test]
    fn test_default_init_is_noop() -> Result<(), BridgeError> {
        let dispatcher = MqttToPubSubDispatcher::new(
            mqtt_to_pubsub_fn(|_input, _output| Ok(())),
            context("noop"),
        )?;
        // no call to the setter means no output, not an error
        assert!(dispatcher
            .try_dispatch(PublishPacket::new("a", "b"))?
            .is_empty());
        Ok(())
    }

    struct FailingInit;

    impl PubSubToMqttTransformer for FailingInit {
        fn init(&mut self, _input: &TransformerInitInput) -> Result<(), TransformError> {
            Err("missing setting".into())
        }

        fn transform_pubsub_to_mqtt(
            &self,
            _input: &PubSubToMqttInput,
            _output: &mut PubSubToMqttOutput,
        ) -> Result<(), TransformError> {
            Ok(())
        }
    }

    #[test]
    fn test_init_failure_disables_binding() {
        let result = PubSubToMqttDispatcher::new(FailingInit, context("broken"));
        assert!(matches!(
            result,
            Err(BridgeError::InitFailed { ref binding, ref reason })
                if binding == "broken" && reason == "missing setting"
        ));
    }

    #[test]
    fn test_error_and_panic_are_contained() -> Result<(), BridgeError> {
        let dispatcher = MqttToPubSubDispatcher::new(
            mqtt_to_pubsub_fn(|input, output| {
                let message = output
                    .new_message_builder()
                    .topic_name("sensors")?
                    .data_str("partial")?
                    .build()?;
                output.set_messages(vec![message])?;
                match input.publish_packet().topic.as_str() {
                    "error" => Err("bad payload".into()),
                    "panic" => panic!("boom"),
                    _ => Ok(()),
                }
            }),
            context("faulty"),
        )?;

        assert!(matches!(
            dispatcher.try_dispatch(PublishPacket::new("error", "x")),
            Err(BridgeError::TransformFault { ref reason, .. }) if reason == "bad payload"
        ));
        assert!(matches!(
            dispatcher.try_dispatch(PublishPacket::new("panic", "x")),
            Err(BridgeError::TransformFault { ref reason, .. }) if reason == "boom"
        ));
        assert!(dispatcher.dispatch(PublishPacket::new("panic", "x")).is_empty());
        assert_eq!(dispatcher.dispatch(PublishPacket::new("ok", "x")).len(), 1);
        Ok(())
    }

    #[test]
    fn test_foreign_output_is_discarded() -> Result<(), BridgeError> {
        let dispatcher = MqttToPubSubDispatcher::new(
            mqtt_to_pubsub_fn(|_input, output| {
                let mut foreign = crate::builder::OutboundMessageBuilder::new();
                let message = foreign.topic_name("sensors")?.data_str("x")?.build()?;
                // the error is ignored on purpose
                let _ = output.set_messages(vec![message]);
                Ok(())
            }),
            context("foreign"),
        )?;
        assert_eq!(
            dispatcher.try_dispatch(PublishPacket::new("a", "b")),
            Err(BridgeError::ForeignOrigin)
        );
        assert!(dispatcher.dispatch(PublishPacket::new("a", "b")).is_empty());
        Ok(())
    }

    #[test]
    fn test_order_and_duplicates_preserved() -> Result<(), BridgeError> {
        let dispatcher = PubSubToMqttDispatcher::new(
            pubsub_to_mqtt_fn(|input, output| {
                let message = input.inbound_message();
                let mut builder = output.new_publish_builder();
                let m1 = builder
                    .topic("out/1")?
                    .payload(message.data().cloned().unwrap_or_default())
                    .build()?;
                let m2 = builder.topic("out/2")?.build()?;
                output.set_publishes(vec![m1.clone(), m2, m1])?;
                Ok(())
            }),
            context("to-mqtt"),
        )?;
        let publishes = dispatcher.try_dispatch(inbound("1", "data"))?;
        let topics: Vec<&str> = publishes.iter().map(|p| p.topic()).collect();
        assert_eq!(topics, vec!["out/1", "out/2", "out/1"]);
        assert_eq!(publishes[0], publishes[2]);
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_invocations_are_isolated() -> Result<(), Box<dyn std::error::Error>> {
        let dispatcher = Arc::new(MqttToPubSubDispatcher::new(
            mqtt_to_pubsub_fn(|input, output| {
                let packet = input.publish_packet();
                if packet.topic == "poison" {
                    return Err("poisoned event".into());
                }
                let message = output
                    .new_message_builder()
                    .topic_name("sensors")?
                    .attribute("source", &packet.topic)?
                    .build()?;
                output.set_messages(vec![message])?;
                Ok(())
            }),
            context("concurrent"),
        )?);

        let mut handles = Vec::new();
        for i in 0..16 {
            let dispatcher = Arc::clone(&dispatcher);
            let topic = match i % 4 {
                0 => "poison".to_owned(),
                _ => format!("devices/{}", i),
            };
            handles.push(tokio::task::spawn_blocking(move || {
                (topic.clone(), dispatcher.dispatch(PublishPacket::new(&topic, "x")))
            }));
        }

        for handle in handles {
            let (topic, messages) = handle.await?;
            if topic == "poison" {
                assert!(messages.is_empty());
            } else {
                assert_eq!(messages.len(), 1);
                assert_eq!(messages[0].attributes().get("source"), Some(topic.as_str()));
            }
        }
        Ok(())
    }
}
