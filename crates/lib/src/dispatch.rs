//! Dispatcher: validate topic and action, resolve parameters, invoke.
//!
//! Dispatch runs synchronously up to the invocation, which is spawned on the
//! tokio runtime and completes through the operation's callback. Every failure
//! before that point is returned to the caller as a `DispatchError`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinHandle;

use crate::api::{ApiClient, ClientError};
use crate::callback::{Callback, Outcome};
use crate::message::FlowMessage;
use crate::registry::{self, Namespace, Operation};
use crate::resolver::{resolve_parameters, Argument};

/// Dispatch progress, used to tag failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ValidatingTopic,
    ValidatingAction,
    ResolvingParameters,
    Invoking,
    AwaitingResponse,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::ValidatingTopic => "validating topic",
            Stage::ValidatingAction => "validating action",
            Stage::ResolvingParameters => "resolving parameters",
            Stage::Invoking => "invoking",
            Stage::AwaitingResponse => "awaiting response",
            Stage::Done => "done",
        };
        f.write_str(s)
    }
}

/// Input errors found before anything is sent to the API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("msg.topic should be one of {}", Namespace::names())]
    InvalidTopic { topic: Option<String> },

    #[error("msg.action must be one of {}", .available.join(", "))]
    InvalidAction {
        namespace: Namespace,
        action: Option<String>,
        available: Vec<&'static str>,
    },

    #[error("msg.{field} is empty for '{operation}'")]
    MissingField {
        operation: String,
        field: &'static str,
    },
}

impl DispatchError {
    pub fn stage(&self) -> Stage {
        match self {
            DispatchError::InvalidTopic { .. } => Stage::ValidatingTopic,
            DispatchError::InvalidAction { .. } => Stage::ValidatingAction,
            DispatchError::MissingField { .. } => Stage::ResolvingParameters,
        }
    }

    /// Status reported downstream for input errors.
    pub fn status_code(&self) -> u16 {
        400
    }
}

/// An invocation in flight. Dropping it does not cancel the request.
#[derive(Debug)]
pub struct Pending {
    namespace: Namespace,
    operation: &'static str,
    handle: JoinHandle<()>,
}

impl Pending {
    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// Wait until the callback has fired.
    pub async fn wait(self) {
        if let Err(e) = self.handle.await {
            log::warn!("{}.{} invocation ended abnormally: {}", self.namespace, self.operation, e);
        }
    }

    /// Cancel the invocation. The callback then fires with `Outcome::NoResponse`.
    pub fn abort(&self) {
        self.handle.abort();
    }
}

/// Dispatches flow messages to a shared API client.
#[derive(Clone)]
pub struct Dispatcher {
    client: Arc<dyn ApiClient>,
    timeout: Option<Duration>,
}

impl Dispatcher {
    /// `timeout` bounds each invocation; `None` waits as long as the client does.
    pub fn new(client: Arc<dyn ApiClient>, timeout: Option<Duration>) -> Self {
        Self { client, timeout }
    }

    /// Validate and resolve `msg`, then start the invocation. `make_callback`
    /// supplies the completion callback for the operation's `callback` parameter.
    pub fn dispatch(
        &self,
        msg: &FlowMessage,
        make_callback: impl FnMut() -> Callback,
    ) -> Result<Pending, DispatchError> {
        let namespace = parse_topic(msg.topic.as_deref())?;
        let operation = registry::validate(namespace, msg.action.as_deref())?;
        let args = resolve_parameters(operation.name, operation.params, msg, make_callback)?;
        log::debug!(
            "{} {}.{} with {} argument(s)",
            Stage::Invoking,
            namespace,
            operation.name,
            args.len()
        );
        let handle = tokio::spawn(invoke(
            Arc::clone(&self.client),
            operation,
            args,
            self.timeout,
        ));
        Ok(Pending {
            namespace,
            operation: operation.name,
            handle,
        })
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Exact match of the topic against the namespace names.
pub fn parse_topic(topic: Option<&str>) -> Result<Namespace, DispatchError> {
    topic
        .and_then(|t| t.parse::<Namespace>().ok())
        .ok_or_else(|| DispatchError::InvalidTopic {
            topic: topic.map(str::to_string),
        })
}

/// Bind the arguments, send, and hand the outcome to the callback. A request
/// that cannot be built is reported through the callback like a failed send.
async fn invoke(
    client: Arc<dyn ApiClient>,
    operation: &'static Operation,
    args: Vec<Argument>,
    timeout: Option<Duration>,
) {
    let mut values: Vec<(&str, Value)> = Vec::with_capacity(args.len());
    let mut callback = None;
    for arg in args {
        match arg {
            Argument::Value { name, value } => values.push((name, value)),
            Argument::Callback(cb) => callback = Some(cb),
        }
    }

    let outcome: Outcome = match operation.endpoint.bind(operation.name, &values) {
        Ok(request) => {
            log::debug!("{} {}: {}", Stage::AwaitingResponse, operation.name, request);
            send(client.as_ref(), request, timeout).await.into()
        }
        Err(e) => Outcome::Failed(e),
    };

    match callback {
        Some(cb) => cb.call(outcome),
        None => log::warn!(
            "{} takes no callback; outcome discarded: {:?}",
            operation.name,
            outcome
        ),
    }
    log::debug!("{} {}", Stage::Done, operation.name);
}

async fn send(
    client: &dyn ApiClient,
    request: crate::api::ApiRequest,
    timeout: Option<Duration>,
) -> Result<crate::api::ApiResponse, ClientError> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, client.send(request))
            .await
            .map_err(|_| ClientError::Timeout(limit))?,
        None => client.send(request).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiRequest, ApiResponse};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    /// Answers every request with a fixed response and records what it was sent.
    struct FakeClient {
        response: ApiResponse,
        requests: Mutex<Vec<ApiRequest>>,
    }

    impl FakeClient {
        fn answering(response: ApiResponse) -> Arc<Self> {
            Arc::new(Self {
                response,
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<ApiRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ApiClient for FakeClient {
        async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
            self.requests.lock().unwrap().push(request);
            Ok(self.response.clone())
        }
    }

    /// Never answers.
    struct HangingClient;

    #[async_trait]
    impl ApiClient for HangingClient {
        async fn send(&self, _request: ApiRequest) -> Result<ApiResponse, ClientError> {
            std::future::pending().await
        }
    }

    fn reporting() -> (impl FnMut() -> Callback, mpsc::UnboundedReceiver<Outcome>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let make = move || {
            let tx = tx.clone();
            Callback::new(move |outcome| {
                let _ = tx.send(outcome);
            })
        };
        (make, rx)
    }

    #[test]
    fn parse_topic_accepts_every_namespace() {
        for ns in Namespace::ALL {
            assert_eq!(parse_topic(Some(ns.as_str())), Ok(ns));
        }
    }

    #[test]
    fn parse_topic_rejects_unknown_and_unset() {
        let err = parse_topic(Some("bogus")).unwrap_err();
        assert_eq!(
            err,
            DispatchError::InvalidTopic {
                topic: Some("bogus".to_string())
            }
        );
        assert_eq!(err.stage(), Stage::ValidatingTopic);
        assert!(err.to_string().starts_with("msg.topic should be one of collections"));
        assert!(parse_topic(None).is_err());
    }

    #[tokio::test]
    async fn invalid_topic_touches_nothing() {
        let client = FakeClient::answering(ApiResponse::new(200, "{}"));
        let dispatcher = Dispatcher::new(client.clone(), None);
        let (make, _rx) = reporting();
        let msg = FlowMessage::new("bogus", "view");
        let err = dispatcher.dispatch(&msg, make).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidTopic { .. }));
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn invalid_action_is_rejected_before_resolution() {
        let client = FakeClient::answering(ApiResponse::new(200, "{}"));
        let dispatcher = Dispatcher::new(client.clone(), None);
        let (make, _rx) = reporting();
        let msg = FlowMessage::new("devices", "explode").with_topic_id("abc");
        let err = dispatcher.dispatch(&msg, make).unwrap_err();
        assert_eq!(err.stage(), Stage::ValidatingAction);
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn missing_field_is_rejected_before_invocation() {
        let client = FakeClient::answering(ApiResponse::new(200, "{}"));
        let dispatcher = Dispatcher::new(client.clone(), None);
        let (make, mut rx) = reporting();
        let msg = FlowMessage::new("devices", "update").with_topic_id("abc");
        let err = dispatcher.dispatch(&msg, make).unwrap_err();
        assert_eq!(err.to_string(), "msg.payload is empty for 'update'");
        assert_eq!(err.stage(), Stage::ResolvingParameters);
        assert!(client.requests().is_empty());
        assert!(rx.try_recv().is_err(), "no callback may fire for a rejected message");
    }

    #[tokio::test]
    async fn view_sends_get_and_reports_response() {
        let client = FakeClient::answering(ApiResponse::from_json(200, json!({"name": "sensor1"})));
        let dispatcher = Dispatcher::new(client.clone(), None);
        let (make, mut rx) = reporting();
        let msg = FlowMessage::new("devices", "view").with_topic_id("abc123");

        let pending = dispatcher.dispatch(&msg, make).unwrap();
        assert_eq!(pending.namespace(), Namespace::Devices);
        assert_eq!(pending.operation(), "view");
        pending.wait().await;

        let requests = client.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].to_string(), "GET /devices/abc123");
        match rx.recv().await {
            Some(Outcome::Response(res)) => {
                assert_eq!(res.status, 200);
                assert_eq!(res.json, Some(json!({"name": "sensor1"})));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn post_values_wraps_payload() {
        let client = FakeClient::answering(ApiResponse::new(202, r#"{"status":"accepted"}"#));
        let dispatcher = Dispatcher::new(client.clone(), None);
        let (make, _rx) = reporting();
        let values = json!([{"timestamp": "2015-01-01T00:00:00Z", "value": 21.5}]);
        let msg = FlowMessage::new("devices", "postValues")
            .with_topic_id("d1")
            .with_sub_topic_id("temperature")
            .with_payload(values.clone());

        dispatcher.dispatch(&msg, make).unwrap().wait().await;

        let req = &client.requests()[0];
        assert_eq!(req.to_string(), "POST /devices/d1/streams/temperature/values");
        assert_eq!(req.body, Some(json!({ "values": values })));
    }

    #[tokio::test]
    async fn list_without_payload_sends_no_query() {
        let client = FakeClient::answering(ApiResponse::new(200, r#"{"devices":[]}"#));
        let dispatcher = Dispatcher::new(client.clone(), None);
        let (make, _rx) = reporting();
        dispatcher
            .dispatch(&FlowMessage::new("devices", "list"), make)
            .unwrap()
            .wait()
            .await;
        let req = &client.requests()[0];
        assert_eq!(req.path(), "/devices");
        assert!(req.query.is_empty());
    }

    #[tokio::test]
    async fn unbindable_request_is_reported_through_callback() {
        let client = FakeClient::answering(ApiResponse::new(200, "{}"));
        let dispatcher = Dispatcher::new(client.clone(), None);
        let (make, mut rx) = reporting();
        let msg = FlowMessage::new("devices", "list").with_payload(json!("limit=10"));

        dispatcher.dispatch(&msg, make).unwrap().wait().await;

        assert!(client.requests().is_empty());
        assert!(matches!(rx.recv().await, Some(Outcome::Failed(ClientError::Invalid(_)))));
    }

    #[tokio::test]
    async fn timeout_is_reported_as_failure() {
        let dispatcher = Dispatcher::new(Arc::new(HangingClient), Some(Duration::from_millis(20)));
        let (make, mut rx) = reporting();
        let msg = FlowMessage::new("jobs", "view").with_topic_id("j1");

        dispatcher.dispatch(&msg, make).unwrap().wait().await;

        match rx.recv().await {
            Some(Outcome::Failed(e @ ClientError::Timeout(_))) => assert_eq!(e.status_code(), 504),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn aborted_invocation_reports_no_response_once() {
        let dispatcher = Dispatcher::new(Arc::new(HangingClient), None);
        let (make, mut rx) = reporting();
        let msg = FlowMessage::new("jobs", "view").with_topic_id("j1");

        let pending = dispatcher.dispatch(&msg, make).unwrap();
        tokio::task::yield_now().await;
        pending.abort();
        pending.wait().await;

        assert!(matches!(rx.recv().await, Some(Outcome::NoResponse)));
        assert!(rx.try_recv().is_err());
    }
}
