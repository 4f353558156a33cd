use super::endpoint::redacted;
use super::{ControlMessage, Filter, InboundFrame, OutboundFrame, realtime_url};
use crate::utils::RealtimeError;
use serde::Serialize;
use serde_json::{Value, json};

fn parse(frame: &OutboundFrame) -> Value {
    serde_json::from_str(frame.text()).unwrap()
}

#[test]
fn test_https_base_becomes_wss() {
    let url = realtime_url("https://api.example.com/v1", "realtime", "projectId", "p-123").unwrap();
    assert_eq!(
        url.as_str(),
        "wss://api.example.com/realtime?projectId=p-123"
    );
}

#[test]
fn test_http_base_becomes_ws_and_keeps_port() {
    let url = realtime_url("http://localhost:8080/v2/", "realtime", "projectId", "p").unwrap();
    assert_eq!(url.as_str(), "ws://localhost:8080/realtime?projectId=p");
}

#[test]
fn test_non_version_path_is_kept() {
    let url = realtime_url(
        "https://example.com/api/v1",
        "/ws/realtime/",
        "token",
        "abc",
    )
    .unwrap();
    assert_eq!(url.as_str(), "wss://example.com/api/ws/realtime?token=abc");

    let url = realtime_url("https://example.com/api", "realtime", "token", "abc").unwrap();
    assert_eq!(url.path(), "/api/realtime");

    // only a `v<digits>` segment counts as a version
    let url = realtime_url("https://example.com/videos", "realtime", "token", "abc").unwrap();
    assert_eq!(url.path(), "/videos/realtime");
}

#[test]
fn test_existing_query_and_fragment_are_replaced() {
    let url = realtime_url(
        "https://example.com/v1?debug=1#top",
        "realtime",
        "projectId",
        "p",
    )
    .unwrap();
    assert_eq!(url.as_str(), "wss://example.com/realtime?projectId=p");
}

#[test]
fn test_credential_is_percent_encoded() {
    let url = realtime_url("https://example.com/v1", "realtime", "projectId", "a b&c=d").unwrap();
    let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    assert_eq!(pairs, vec![("projectId".to_string(), "a b&c=d".to_string())]);
    assert!(!url.as_str().contains("a b"));
}

#[test]
fn test_invalid_bases_are_rejected() {
    let err = realtime_url("ftp://example.com/v1", "realtime", "projectId", "p").unwrap_err();
    assert!(matches!(err, RealtimeError::InvalidUrl(_)));

    let err = realtime_url("not a url", "realtime", "projectId", "p").unwrap_err();
    assert!(matches!(err, RealtimeError::InvalidUrl(_)));
}

#[test]
fn test_redacted_hides_credential() {
    let url = realtime_url("https://example.com/v1", "realtime", "projectId", "secret").unwrap();
    let shown = redacted(&url);
    assert_eq!(shown, "wss://example.com/realtime");
    assert!(!shown.contains("secret"));
}

#[test]
fn test_control_frames_serialize() {
    let subscribe = OutboundFrame::control(&ControlMessage::Subscribe {
        topic: "orders".into(),
        filter: None,
    })
    .unwrap();
    assert_eq!(subscribe.kind(), "subscribe");
    assert_eq!(
        parse(&subscribe),
        json!({"type": "subscribe", "topic": "orders", "filter": null})
    );

    let mut filter = Filter::new();
    filter.insert("status".into(), json!("open"));
    let filtered = OutboundFrame::control(&ControlMessage::Subscribe {
        topic: "orders".into(),
        filter: Some(filter),
    })
    .unwrap();
    assert_eq!(
        parse(&filtered),
        json!({"type": "subscribe", "topic": "orders", "filter": {"status": "open"}})
    );

    let unsubscribe = OutboundFrame::control(&ControlMessage::Unsubscribe {
        topic: "orders".into(),
    })
    .unwrap();
    assert_eq!(
        parse(&unsubscribe),
        json!({"type": "unsubscribe", "topic": "orders"})
    );

    let ping = OutboundFrame::control(&ControlMessage::Ping).unwrap();
    assert_eq!(ping.kind(), "ping");
    assert_eq!(ping.text(), r#"{"type":"ping"}"#);
}

#[test]
fn test_application_frame_from_struct() {
    #[derive(Serialize)]
    struct Chat<'a> {
        #[serde(rename = "type")]
        kind: &'a str,
        text: &'a str,
    }

    let frame = OutboundFrame::application(&Chat {
        kind: "chat",
        text: "hello",
    })
    .unwrap();
    assert_eq!(frame.kind(), "chat");
    assert_eq!(parse(&frame), json!({"type": "chat", "text": "hello"}));
}

#[test]
fn test_application_frame_requires_type() {
    let cases = [
        json!({"text": "hello"}),
        json!({"type": ""}),
        json!({"type": 3}),
        json!("chat"),
        json!(null),
    ];
    for case in cases {
        let err = OutboundFrame::application(&case).unwrap_err();
        assert!(
            matches!(err, RealtimeError::InvalidMessage(_)),
            "{case} should be rejected"
        );
    }
}

#[test]
fn test_inbound_decode() {
    assert_eq!(
        InboundFrame::decode(r#"{"type":"pong"}"#).unwrap(),
        InboundFrame::Pong
    );

    match InboundFrame::decode(r#"{"type":"created","topic":"orders","id":1}"#).unwrap() {
        InboundFrame::Topic { topic, message } => {
            assert_eq!(topic, "orders");
            assert_eq!(message["id"], 1);
        }
        other => panic!("expected topic frame, got {other:?}"),
    }

    assert_eq!(
        InboundFrame::decode(r#"{"type":"ack","topic":42}"#).unwrap(),
        InboundFrame::Other(json!({"type": "ack", "topic": 42}))
    );
}

#[test]
fn test_inbound_decode_rejects_garbage() {
    assert!(matches!(
        InboundFrame::decode("{not json"),
        Err(RealtimeError::Serialization(_))
    ));
    assert!(matches!(
        InboundFrame::decode("[1, 2]"),
        Err(RealtimeError::InvalidMessage(_))
    ));
}
