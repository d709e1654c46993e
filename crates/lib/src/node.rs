//! M2X node: accepts flow messages, dispatches them and emits one outbound
//! message per input on its output port.
//!
//! The node has two ports: `messages` for outbound flow messages and `errors`
//! for node-level reports (the flow's catch port). A message rejected before
//! invocation goes to one or the other depending on `ErrorMode`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::api::{ApiClient, M2xClient};
use crate::callback::Callback;
use crate::config::{self, Config, ErrorMode};
use crate::dispatch::{DispatchError, Dispatcher, Pending};
use crate::message::FlowMessage;
use crate::normalize::{diagnostic, normalize};

/// Node-level errors, reported on the error port.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("missing m2x feed: no API key configured")]
    MissingFeed,

    #[error("{error}")]
    Dispatch {
        error: DispatchError,
        message: FlowMessage,
    },
}

/// Sending half of the node's ports.
#[derive(Debug, Clone)]
pub struct Output {
    messages: mpsc::UnboundedSender<FlowMessage>,
    errors: mpsc::UnboundedSender<NodeError>,
}

/// Receiving half of the node's ports.
#[derive(Debug)]
pub struct OutputReceiver {
    pub messages: mpsc::UnboundedReceiver<FlowMessage>,
    pub errors: mpsc::UnboundedReceiver<NodeError>,
}

impl Output {
    pub fn channel() -> (Output, OutputReceiver) {
        let (messages, messages_rx) = mpsc::unbounded_channel();
        let (errors, errors_rx) = mpsc::unbounded_channel();
        (
            Output { messages, errors },
            OutputReceiver {
                messages: messages_rx,
                errors: errors_rx,
            },
        )
    }

    pub fn send(&self, msg: FlowMessage) {
        if self.messages.send(msg).is_err() {
            log::warn!("m2x: message output closed; outbound message dropped");
        }
    }

    pub fn error(&self, err: NodeError) {
        if let Err(mpsc::error::SendError(err)) = self.errors.send(err) {
            log::warn!("m2x: error output closed; dropped report: {}", err);
        }
    }
}

pub struct M2xNode {
    name: String,
    dispatcher: Option<Dispatcher>,
    error_mode: ErrorMode,
    output: Output,
}

impl M2xNode {
    /// `client` is `None` when no feed credential is configured; every input then
    /// fails with `NodeError::MissingFeed`.
    pub fn new(
        name: impl Into<String>,
        client: Option<Arc<dyn ApiClient>>,
        timeout: Option<Duration>,
        error_mode: ErrorMode,
        output: Output,
    ) -> Self {
        Self {
            name: name.into(),
            dispatcher: client.map(|c| Dispatcher::new(c, timeout)),
            error_mode,
            output,
        }
    }

    /// Build the node from config: API key and endpoint (with env overrides),
    /// timeout and error mode.
    pub fn from_config(config: &Config, output: Output) -> Self {
        let client = config::resolve_api_key(config).map(|key| {
            let endpoint = config::resolve_endpoint(config);
            log::info!(
                "m2x: feed {} at {}",
                config.feed.name.as_deref().unwrap_or("(unnamed)"),
                endpoint
            );
            Arc::new(M2xClient::new(key, Some(endpoint))) as Arc<dyn ApiClient>
        });
        let name = config.node.name.clone().unwrap_or_else(|| "m2x".to_string());
        Self::new(
            name,
            client,
            config::resolve_timeout(config),
            config.node.error_mode,
            output,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handle one inbound message. Returns the in-flight invocation, or `None` when
    /// the message was settled synchronously (rejected, or no feed configured).
    pub fn on_input(&self, msg: FlowMessage) -> Option<Pending> {
        let Some(dispatcher) = &self.dispatcher else {
            log::error!("{}: {}", self.name, NodeError::MissingFeed);
            self.output.error(NodeError::MissingFeed);
            return None;
        };

        let make_callback = || {
            let original = msg.clone();
            let output = self.output.clone();
            Callback::new(move |outcome| output.send(normalize(original, outcome)))
        };

        match dispatcher.dispatch(&msg, make_callback) {
            Ok(pending) => {
                log::debug!(
                    "{}: {}.{} dispatched",
                    self.name,
                    pending.namespace(),
                    pending.operation()
                );
                Some(pending)
            }
            Err(error) => {
                log::warn!("{}: {} ({})", self.name, error, error.stage());
                match self.error_mode {
                    ErrorMode::Emit => self.output.send(diagnostic(msg, &error)),
                    ErrorMode::Log => self.output.error(NodeError::Dispatch {
                        error,
                        message: msg,
                    }),
                }
                None
            }
        }
    }
}

impl std::fmt::Debug for M2xNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("M2xNode")
            .field("name", &self.name)
            .field("configured", &self.dispatcher.is_some())
            .field("error_mode", &self.error_mode)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiRequest, ApiResponse, ClientError};
    use async_trait::async_trait;
    use serde_json::json;

    struct Fixed(ApiResponse);

    #[async_trait]
    impl ApiClient for Fixed {
        async fn send(&self, _request: ApiRequest) -> Result<ApiResponse, ClientError> {
            Ok(self.0.clone())
        }
    }

    fn node(response: ApiResponse, mode: ErrorMode) -> (M2xNode, OutputReceiver) {
        let (output, rx) = Output::channel();
        let node = M2xNode::new("test", Some(Arc::new(Fixed(response))), None, mode, output);
        (node, rx)
    }

    #[tokio::test]
    async fn view_emits_normalized_response() {
        let res = ApiResponse::from_json(200, json!({"name": "sensor1"}));
        let (node, mut rx) = node(res, ErrorMode::Emit);
        let msg = FlowMessage::new("devices", "view").with_topic_id("abc123");

        node.on_input(msg).expect("dispatched").wait().await;

        let out = rx.messages.recv().await.unwrap();
        assert_eq!(out.to_json(), json!({"payload": {"name": "sensor1"}, "statusCode": 200}));
        assert!(rx.messages.try_recv().is_err());
    }

    #[tokio::test]
    async fn emit_mode_sends_diagnostic_for_bad_topic() {
        let (node, mut rx) = node(ApiResponse::new(200, "{}"), ErrorMode::Emit);
        assert!(node.on_input(FlowMessage::new("bogus", "view")).is_none());

        let out = rx.messages.recv().await.unwrap();
        assert_eq!(out.status_code, Some(400));
        assert!(out.payload.as_ref().unwrap().as_str().unwrap().starts_with("msg.topic should be one of"));
        assert!(!out.has_control_fields());
        assert!(rx.errors.try_recv().is_err());
    }

    #[tokio::test]
    async fn log_mode_reports_on_error_port_only() {
        let (node, mut rx) = node(ApiResponse::new(200, "{}"), ErrorMode::Log);
        let msg = FlowMessage::new("devices", "update").with_topic_id("d1");
        assert!(node.on_input(msg.clone()).is_none());

        match rx.errors.recv().await {
            Some(NodeError::Dispatch { error, message }) => {
                assert_eq!(error.to_string(), "msg.payload is empty for 'update'");
                assert_eq!(message, msg);
            }
            other => panic!("unexpected report: {:?}", other),
        }
        assert!(rx.messages.try_recv().is_err());
    }

    #[tokio::test]
    async fn malformed_control_fields_still_get_a_diagnostic() {
        let (node, mut rx) = node(ApiResponse::new(200, "{}"), ErrorMode::Emit);
        let bad_topic = "msg.topic should be one of";
        let inputs = [
            (r#"{"topic":{"x":1},"action":"view"}"#, bad_topic),
            (r#"{"topic":"bogus","action":"view","statusCode":"ok"}"#, bad_topic),
            (r#"{"topic":"devices","action":"view","topic_id":["a"]}"#, "msg.topic_id is empty"),
        ];
        for (line, reason) in inputs {
            let msg = FlowMessage::from_json(line).expect("any JSON object parses");
            assert!(node.on_input(msg).is_none(), "{}", line);

            let out = rx.messages.recv().await.unwrap();
            assert_eq!(out.status_code, Some(400), "{}", line);
            assert!(out.payload.unwrap().as_str().unwrap().starts_with(reason), "{}", line);
            assert!(!out.extra.contains_key("statusCode"), "{}", line);
        }
    }

    #[tokio::test]
    async fn dot_identifier_is_a_server_error_not_another_resource() {
        let (node, mut rx) = node(ApiResponse::new(204, ""), ErrorMode::Emit);
        let msg = FlowMessage::new("keys", "delete").with_topic_id("..");

        node.on_input(msg).unwrap().wait().await;

        let out = rx.messages.recv().await.unwrap();
        assert_eq!(out.status_code, Some(500));
        assert!(out.payload.unwrap().as_str().unwrap().contains("path segment"));
    }

    #[tokio::test]
    async fn missing_feed_emits_nothing() {
        let (output, mut rx) = Output::channel();
        let node = M2xNode::new("unconfigured", None, None, ErrorMode::Emit, output);
        assert!(node
            .on_input(FlowMessage::new("devices", "view").with_topic_id("d1"))
            .is_none());

        assert!(matches!(rx.errors.recv().await, Some(NodeError::MissingFeed)));
        assert!(rx.messages.try_recv().is_err());
    }

    #[tokio::test]
    async fn error_response_is_emitted_with_status() {
        let res = ApiResponse::new(404, r#"{"message":"not found"}"#);
        let (node, mut rx) = node(res, ErrorMode::Emit);
        let msg = FlowMessage::new("devices", "view").with_topic_id("nope");

        node.on_input(msg).unwrap().wait().await;

        let out = rx.messages.recv().await.unwrap();
        assert_eq!(out.payload, Some(json!({"message": "not found"})));
        assert_eq!(out.status_code, Some(404));
    }

    #[tokio::test]
    async fn from_config_without_key_is_unconfigured() {
        let (output, _rx) = Output::channel();
        let mut config = Config::default();
        config.node.name = Some("office".into());
        let node = M2xNode::from_config(&config, output);
        assert_eq!(node.name(), "office");
        // M2X_API_KEY may be set in the environment running the tests.
        if std::env::var("M2X_API_KEY").is_err() {
            assert!(format!("{:?}", node).contains("configured: false"));
        }
    }
}
