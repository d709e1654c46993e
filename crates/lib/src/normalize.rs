//! Response normalizer: shapes an invocation outcome into the outbound message.

use serde_json::{Map, Value};

use crate::callback::Outcome;
use crate::dispatch::DispatchError;
use crate::message::FlowMessage;

/// Status reported when no usable response exists or the body cannot be read.
pub const SERVER_ERROR_CODE: u16 = 500;

/// Status reported for messages rejected before invocation.
pub const INPUT_ERROR_CODE: u16 = 400;

/// Build the outbound message for `msg` from the invocation outcome. Control
/// fields are always removed; everything else on the message is carried through.
pub fn normalize(mut msg: FlowMessage, outcome: Outcome) -> FlowMessage {
    let (payload, status) = match outcome {
        Outcome::NoResponse => {
            log::error!("m2x: no response received");
            (Value::Object(Map::new()), SERVER_ERROR_CODE)
        }
        Outcome::Failed(e) => {
            log::error!("m2x: {}", e);
            (Value::String(e.to_string()), e.status_code())
        }
        Outcome::Response(res) if res.is_error() => {
            log::error!("m2x: request failed with status {}: {}", res.status, res.raw);
            let status = res.status;
            let payload = res.json.unwrap_or(Value::String(res.raw));
            (payload, status)
        }
        Outcome::Response(res) if !res.is_unparsed() => match res.json {
            Some(body) => (body, res.status),
            None => (Value::String(res.raw), res.status),
        },
        Outcome::Response(res) => {
            log::warn!(
                "m2x: response body with status {} is not JSON; forwarding raw text",
                res.status
            );
            (Value::String(res.raw), SERVER_ERROR_CODE)
        }
    };
    msg.payload = Some(payload);
    msg.set_status(status);
    msg.strip_control_fields();
    msg
}

/// Diagnostic message for an input error: status 400 with the reason as payload.
pub fn diagnostic(mut msg: FlowMessage, error: &DispatchError) -> FlowMessage {
    msg.payload = Some(Value::String(error.to_string()));
    msg.set_status(error.status_code());
    msg.strip_control_fields();
    msg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiResponse, ClientError};
    use serde_json::json;
    use std::time::Duration;

    fn inbound() -> FlowMessage {
        let mut msg = FlowMessage::new("devices", "view")
            .with_topic_id("abc123")
            .with_sub_topic_id("temperature");
        msg.extra.insert("_msgid".to_string(), json!("m-1"));
        msg
    }

    #[test]
    fn success_sets_parsed_body_and_status() {
        let res = ApiResponse::from_json(200, json!({"name": "sensor1"}));
        let out = normalize(inbound(), Outcome::Response(res));
        assert_eq!(out.payload, Some(json!({"name": "sensor1"})));
        assert_eq!(out.status_code, Some(200));
        assert!(!out.has_control_fields());
        assert_eq!(out.extra.get("_msgid"), Some(&json!("m-1")));
    }

    #[test]
    fn success_serializes_without_control_fields() {
        let res = ApiResponse::from_json(200, json!({"name": "sensor1"}));
        let out = normalize(inbound(), Outcome::Response(res)).to_json();
        assert_eq!(
            out,
            json!({"payload": {"name": "sensor1"}, "statusCode": 200, "_msgid": "m-1"})
        );
    }

    #[test]
    fn error_response_keeps_structured_body_and_status() {
        let res = ApiResponse::new(404, r#"{"message":"not found"}"#);
        let out = normalize(inbound(), Outcome::Response(res));
        assert_eq!(out.payload, Some(json!({"message": "not found"})));
        assert_eq!(out.status_code, Some(404));
    }

    #[test]
    fn error_response_without_json_uses_raw_text() {
        let res = ApiResponse::new(502, "Bad Gateway");
        let out = normalize(inbound(), Outcome::Response(res));
        assert_eq!(out.payload, Some(json!("Bad Gateway")));
        assert_eq!(out.status_code, Some(502));
    }

    #[test]
    fn no_response_is_server_error_with_empty_payload() {
        let out = normalize(inbound(), Outcome::NoResponse);
        assert_eq!(out.payload, Some(json!({})));
        assert_eq!(out.status_code, Some(SERVER_ERROR_CODE));
        assert!(!out.has_control_fields());
    }

    #[test]
    fn client_failure_reports_error_text() {
        let out = normalize(inbound(), Outcome::Failed(ClientError::Invalid("bad".into())));
        assert_eq!(out.payload, Some(json!("invalid m2x request: bad")));
        assert_eq!(out.status_code, Some(500));

        let out = normalize(
            inbound(),
            Outcome::Failed(ClientError::Timeout(Duration::from_secs(3))),
        );
        assert_eq!(out.status_code, Some(504));
    }

    #[test]
    fn unparseable_success_falls_back_to_raw_with_server_error() {
        let res = ApiResponse::new(200, "<html>oops</html>");
        let out = normalize(inbound(), Outcome::Response(res));
        assert_eq!(out.payload, Some(json!("<html>oops</html>")));
        assert_eq!(out.status_code, Some(SERVER_ERROR_CODE));
    }

    #[test]
    fn empty_success_body_keeps_status() {
        let out = normalize(inbound(), Outcome::Response(ApiResponse::new(204, "")));
        assert_eq!(out.payload, Some(json!("")));
        assert_eq!(out.status_code, Some(204));
    }

    #[test]
    fn stripping_is_idempotent() {
        let once = normalize(inbound(), Outcome::NoResponse);
        let mut twice = once.clone();
        twice.strip_control_fields();
        assert_eq!(once, twice);
    }

    #[test]
    fn inbound_status_code_that_is_not_a_number_is_replaced() {
        let msg = FlowMessage::from_json(
            r#"{"topic":"devices","action":"view","topic_id":"d1","statusCode":"ok"}"#,
        )
        .unwrap();
        let res = ApiResponse::from_json(200, json!({"id": "d1"}));
        let out = normalize(msg, Outcome::Response(res)).to_json();
        assert_eq!(out, json!({"payload": {"id": "d1"}, "statusCode": 200}));
    }

    #[test]
    fn diagnostic_carries_reason_with_input_error_status() {
        let err = DispatchError::InvalidTopic {
            topic: Some("bogus".into()),
        };
        let out = diagnostic(FlowMessage::new("bogus", "view"), &err);
        assert_eq!(out.status_code, Some(INPUT_ERROR_CODE));
        assert_eq!(out.payload, Some(json!(err.to_string())));
        assert!(!out.has_control_fields());
    }
}
