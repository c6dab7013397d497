// Tests for host bridge wire messages
//
// The host platform parses these JSON shapes, so field names and tags must
// stay exactly as they are.

use voiceflow::bridge::{BridgeCallback, BridgeRequest};
use voiceflow::environment::EnvironmentPreference;

#[test]
fn test_start_request_shape() {
    let msg = BridgeRequest::Start {
        language: "en-US".to_string(),
    };

    let json = serde_json::to_value(&msg).unwrap();
    assert_eq!(json, serde_json::json!({"action": "start", "language": "en-US"}));
}

#[test]
fn test_stop_request_shape() {
    let json = serde_json::to_value(BridgeRequest::Stop).unwrap();
    assert_eq!(json, serde_json::json!({"action": "stop"}));
}

#[test]
fn test_environment_preference_request_shape() {
    let msg = BridgeRequest::SetEnvironmentPreference {
        preference: EnvironmentPreference::Dev,
    };

    let json = serde_json::to_string(&msg).unwrap();
    assert_eq!(json, r#"{"action":"setEnvironmentPreference","preference":"dev"}"#);
}

#[test]
fn test_callbacks_parse_from_host_json() {
    let started: BridgeCallback = serde_json::from_str(r#"{"event":"started"}"#).unwrap();
    assert_eq!(started, BridgeCallback::Started);

    let result: BridgeCallback =
        serde_json::from_str(r#"{"event":"result","transcript":"你好","isFinal":true}"#).unwrap();
    assert_eq!(
        result,
        BridgeCallback::Result {
            transcript: "你好".to_string(),
            is_final: true,
        }
    );

    let error: BridgeCallback =
        serde_json::from_str(r#"{"event":"error","message":"not authorized"}"#).unwrap();
    assert_eq!(
        error,
        BridgeCallback::Error {
            message: "not authorized".to_string()
        }
    );
}

#[test]
fn test_unknown_callback_is_rejected() {
    let parsed = serde_json::from_str::<BridgeCallback>(r#"{"event":"volume","level":3}"#);
    assert!(parsed.is_err());

    let missing_flag = serde_json::from_str::<BridgeCallback>(r#"{"event":"result","transcript":"x"}"#);
    assert!(missing_flag.is_err(), "isFinal is required");
}
