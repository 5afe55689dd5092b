//! Waiting for and comparing inbound responses.

use rtpusher::{Diagnostic, PlayerConfig, PlayerError, ScenarioEngine, SpeedFactor};
use rtpusher_core::InboundMessage;
use serde_json::json;
use std::time::Duration;

use crate::support::{RecordingTime, ScriptedTransport, engine, init_tracing, scenario};

const CHANNELS: &str = r#"
mqtt_publish:
  sensor: {topic: device/sensor, format: json}
mqtt_subscribe:
  status: {topic: backend/status}
  echo: {topic: backend/echo}
  trace: {topic: backend/trace, format: bytes}
timeout: 1.5
"#;

const EXPECT_BATTERY: &str = r#"testdata:
  - id: e1
    content:
      sensor: {battery: 80}
    expect:
      status: {battery: 80}
"#;

fn with_entries(entries: &str) -> String {
    format!("{CHANNELS}{entries}")
}

fn reply(topic: &str, body: &str) -> InboundMessage {
    InboundMessage::new(topic.to_string(), body.as_bytes().to_vec())
}

#[tokio::test(start_paused = true)]
async fn test_matching_response_counts_no_error() {
    init_tracing();
    let transport = ScriptedTransport::new();
    transport.reply_on("device/sensor", "backend/status", r#"{"battery": 80, "uptime": 12}"#);
    let time = RecordingTime::new();

    let report = engine(&transport, &time, 0.0)
        .run(&scenario(&with_entries(EXPECT_BATTERY)))
        .await
        .expect("run");

    assert!(report.is_success(), "{report}");
    assert_eq!(report.received, 1);
    assert_eq!(report.entries, 1);
}

#[tokio::test(start_paused = true)]
async fn test_float_and_integer_compare_equal() {
    let transport = ScriptedTransport::new();
    transport.reply_on("device/sensor", "backend/status", r#"{"battery": 80.0}"#);
    let time = RecordingTime::new();

    let report = engine(&transport, &time, 0.0)
        .run(&scenario(&with_entries(EXPECT_BATTERY)))
        .await
        .expect("run");

    assert!(report.is_success(), "{report}");
}

#[tokio::test(start_paused = true)]
async fn test_mismatch_then_timeout() {
    let transport = ScriptedTransport::new();
    transport.reply_on("device/sensor", "backend/status", r#"{"battery": 79}"#);
    let time = RecordingTime::new();

    let started = tokio::time::Instant::now();
    let report = engine(&transport, &time, 0.0)
        .run(&scenario(&with_entries(EXPECT_BATTERY)))
        .await
        .expect("run");

    // One error for the wrong value, one for never seeing the right one.
    assert_eq!(report.errors(), 2);
    assert_eq!(
        report.failures[0].diagnostics,
        [Diagnostic::FieldMismatch {
            channel: "status".to_string(),
            field: "battery".to_string(),
            expected: json!(80),
            actual: json!(79),
        }]
    );
    assert_eq!(
        report.failures[1].diagnostics,
        [Diagnostic::NotReceived {
            channel: "status".to_string()
        }]
    );
    assert_eq!(report.failures[0].entry, "e1");
    let waited = started.elapsed();
    assert!(waited >= Duration::from_millis(1500) && waited < Duration::from_millis(1600));
}

#[tokio::test(start_paused = true)]
async fn test_later_match_clears_earlier_mismatch() {
    let transport = ScriptedTransport::new();
    transport.respond_with(|topic, _| {
        if topic != "device/sensor" {
            return Vec::new();
        }
        vec![
            reply("backend/status", r#"{"battery": 79}"#),
            reply("backend/status", r#"{"battery": 80}"#),
        ]
    });
    let time = RecordingTime::new();

    let report = engine(&transport, &time, 0.0)
        .run(&scenario(&with_entries(EXPECT_BATTERY)))
        .await
        .expect("run");

    assert_eq!(report.errors(), 1);
    assert_eq!(report.received, 2);
    assert!(matches!(
        report.failures[0].diagnostics[..],
        [Diagnostic::FieldMismatch { .. }]
    ));
}

#[tokio::test(start_paused = true)]
async fn test_silent_channel_times_out_once() {
    let transport = ScriptedTransport::new();
    transport.reply_on("device/sensor", "backend/status", r#"{"battery": 80}"#);
    let time = RecordingTime::new();
    let scenario = scenario(&with_entries(
        r#"testdata:
  - id: both
    content:
      sensor: {battery: 80}
    expect:
      status: {battery: 80}
      echo: {ack: true}
  - id: after
    content:
      sensor: {battery: 81}
"#,
    ));

    let report = engine(&transport, &time, 0.0)
        .run(&scenario)
        .await
        .expect("run");

    assert_eq!(report.errors(), 1);
    assert_eq!(
        report.failures[0].diagnostics,
        [Diagnostic::NotReceived {
            channel: "echo".to_string()
        }]
    );
    assert_eq!(report.entries, 2, "a timeout does not stop the run");
}

#[tokio::test(start_paused = true)]
async fn test_configured_timeout_overrides_scenario() {
    let transport = ScriptedTransport::new();
    let time = RecordingTime::new();
    let config = PlayerConfig::new(SpeedFactor::UNPACED).with_expect_timeout(Duration::from_secs(10));
    let mut engine = ScenarioEngine::new(transport.clone(), time.clone(), config);

    let started = tokio::time::Instant::now();
    let report = engine
        .run(&scenario(&with_entries(EXPECT_BATTERY)))
        .await
        .expect("run");

    assert_eq!(report.errors(), 1);
    let waited = started.elapsed();
    assert!(waited >= Duration::from_secs(10) && waited < Duration::from_millis(10_100));
}

#[tokio::test(start_paused = true)]
async fn test_response_on_unexpected_channel_is_an_error() {
    let transport = ScriptedTransport::new();
    transport.respond_with(|topic, _| {
        if topic != "device/sensor" {
            return Vec::new();
        }
        vec![
            reply("backend/echo", r#"{"ack": true}"#),
            reply("backend/status", r#"{"battery": 80}"#),
        ]
    });
    let time = RecordingTime::new();

    let report = engine(&transport, &time, 0.0)
        .run(&scenario(&with_entries(EXPECT_BATTERY)))
        .await
        .expect("run");

    assert_eq!(report.errors(), 1);
    assert_eq!(
        report.failures[0].diagnostics,
        [Diagnostic::UnexpectedData {
            channel: "echo".to_string()
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn test_non_structured_response_cannot_be_compared() {
    let transport = ScriptedTransport::new();
    transport.reply_on("device/sensor", "backend/trace", "opaque");
    let time = RecordingTime::new();
    let scenario = scenario(&with_entries(
        r#"testdata:
  - id: raw
    content:
      sensor: {battery: 80}
    expect:
      trace: {anything: 1}
"#,
    ));

    let report = engine(&transport, &time, 0.0)
        .run(&scenario)
        .await
        .expect("run");

    assert!(matches!(
        report.failures[0].diagnostics[..],
        [Diagnostic::UnsupportedFormat { .. }]
    ));
    assert!(matches!(
        report.failures[1].diagnostics[..],
        [Diagnostic::NotReceived { .. }]
    ));
}

#[tokio::test(start_paused = true)]
async fn test_undecodable_response_is_counted() {
    let transport = ScriptedTransport::new();
    transport.respond_with(|topic, _| {
        if topic != "device/sensor" {
            return Vec::new();
        }
        vec![
            reply("backend/status", "not json"),
            reply("backend/status", r#"{"battery": 80}"#),
        ]
    });
    let time = RecordingTime::new();

    let report = engine(&transport, &time, 0.0)
        .run(&scenario(&with_entries(EXPECT_BATTERY)))
        .await
        .expect("run");

    assert_eq!(report.errors(), 1);
    assert!(matches!(
        report.failures[0].diagnostics[..],
        [Diagnostic::Undecodable { .. }]
    ));
}

#[tokio::test(start_paused = true)]
async fn test_unroutable_topic_is_fatal() {
    let transport = ScriptedTransport::new();
    transport.reply_on("device/sensor", "somewhere/else", r#"{"battery": 80}"#);
    let time = RecordingTime::new();

    let err = engine(&transport, &time, 0.0)
        .run(&scenario(&with_entries(EXPECT_BATTERY)))
        .await
        .expect_err("unroutable");

    assert!(matches!(err, PlayerError::UnroutableTopic(ref topic) if topic == "somewhere/else"));
}

#[tokio::test(start_paused = true)]
async fn test_empty_expectation_does_not_wait() {
    let transport = ScriptedTransport::new();
    let time = RecordingTime::new();
    let scenario = scenario(&with_entries(
        r#"testdata:
  - id: none
    content:
      sensor: {battery: 80}
    expect: {}
"#,
    ));

    let started = tokio::time::Instant::now();
    let report = engine(&transport, &time, 0.0)
        .run(&scenario)
        .await
        .expect("run");

    assert!(report.is_success());
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_undeclared_expectation_channel_rejected() {
    let transport = ScriptedTransport::new();
    let time = RecordingTime::new();
    let scenario = scenario(&with_entries(
        r#"testdata:
  - id: bad
    content:
      sensor: {battery: 80}
    expect:
      missing: {ok: true}
"#,
    ));

    let err = engine(&transport, &time, 0.0)
        .run(&scenario)
        .await
        .expect_err("unknown expectation channel");

    assert!(matches!(err, PlayerError::Scenario(_)));
    assert!(transport.published().is_empty());
    assert!(transport.subscribe_calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_reply_to_earlier_entry_does_not_satisfy_later_one() {
    let transport = ScriptedTransport::new();
    transport.respond_with(|topic, payload| {
        if topic == "device/sensor" && payload == br#"{"battery":80}"# {
            vec![reply("backend/status", r#"{"battery": 80}"#)]
        } else {
            Vec::new()
        }
    });
    let time = RecordingTime::new();
    let scenario = scenario(&with_entries(
        r#"testdata:
  - id: first
    content:
      sensor: {battery: 80}
  - id: second
    content:
      sensor: {battery: 81}
    expect:
      status: {battery: 80}
"#,
    ));

    let report = engine(&transport, &time, 0.0)
        .run(&scenario)
        .await
        .expect("run");

    assert_eq!(transport.discarded(), 1);
    assert_eq!(report.received, 0);
    assert_eq!(report.errors(), 1);
    assert_eq!(report.failures[0].entry, "second");
    assert_eq!(
        report.failures[0].diagnostics,
        [Diagnostic::NotReceived {
            channel: "status".to_string()
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn test_surplus_replies_dropped_before_next_entry() {
    let transport = ScriptedTransport::new();
    transport.respond_with(|topic, _| {
        if topic != "device/sensor" {
            return Vec::new();
        }
        vec![
            reply("backend/status", r#"{"battery": 80}"#),
            reply("backend/echo", r#"{"ack": true}"#),
        ]
    });
    let time = RecordingTime::new();
    let scenario = scenario(&with_entries(
        r#"testdata:
  - id: first
    content:
      sensor: {battery: 80}
    expect:
      status: {battery: 80}
  - id: second
    content:
      sensor: {battery: 80}
    expect:
      status: {battery: 80}
"#,
    ));

    let report = engine(&transport, &time, 0.0)
        .run(&scenario)
        .await
        .expect("run");

    // Each entry stops reading once `status` matches; its `echo` is dropped.
    assert!(report.is_success(), "{report}");
    assert_eq!(report.received, 2);
    assert_eq!(transport.discarded(), 1);
}
