//! Publishing order, encoding, subscription setup and fatal publish errors.

use rtpusher::{EnginePhase, PlayerConfig, PlayerError, ScenarioEngine, ScenarioError, SpeedFactor};
use rtpusher_core::{CodecError, Document, DocumentCodec, JsonCodec, QoS, TransportError};

use crate::support::{RecordingTime, ScriptedTransport, engine, init_tracing, scenario};

const CHANNELS: &str = r#"
mqtt_publish:
  sensor: {topic: device/sensor, format: json}
  gps: {topic: device/gps, format: nmea}
  time: {topic: device/time, format: json, qos: 2}
  blob: {topic: device/blob, format: bytes}
"#;

fn with_entries(entries: &str) -> String {
    format!("{CHANNELS}testdata:\n{entries}")
}

#[tokio::test(start_paused = true)]
async fn test_time_published_before_everything_else() {
    init_tracing();
    let transport = ScriptedTransport::new();
    let time = RecordingTime::new();
    let scenario = scenario(&with_entries(
        r#"
  - id: 1
    content:
      sensor: {battery: 80}
      gps: {lat: 59.33, long: 18.07}
      time: {epoch: 1}
"#,
    ));

    let report = engine(&transport, &time, 0.0)
        .run(&scenario)
        .await
        .expect("run");

    assert_eq!(
        transport.published_topics(),
        ["device/time", "device/sensor", "device/gps"]
    );
    assert_eq!(transport.published()[0].qos, QoS::ExactlyOnce);
    assert_eq!(report.published, 3);
    assert_eq!(report.entries, 1);
    assert!(report.is_success());
}

#[tokio::test(start_paused = true)]
async fn test_gps_leads_when_no_time_channel() {
    let transport = ScriptedTransport::new();
    let time = RecordingTime::new();
    let scenario = scenario(&with_entries(
        r#"
  - id: 1
    content:
      sensor: {battery: 80}
      blob: {string: raw}
      gps: {lat: 1.0, long: 2.0}
"#,
    ));

    engine(&transport, &time, 0.0)
        .run(&scenario)
        .await
        .expect("run");

    assert_eq!(
        transport.published_topics(),
        ["device/gps", "device/sensor", "device/blob"]
    );
    let blob = &transport.published()[2];
    assert_eq!(blob.payload, b"raw");
}

#[tokio::test(start_paused = true)]
async fn test_gps_example_end_to_end() {
    let transport = ScriptedTransport::new();
    let time = RecordingTime::new();
    let scenario = scenario(&with_entries(
        r#"
  - id: t1
    content:
      gps: {lat: 59.33, long: 18.07, timestamp: "2024-01-01T10:00:00Z"}
    sleep: 2
"#,
    ));

    let mut engine = engine(&transport, &time, 2.0);
    engine.run(&scenario).await.expect("run");

    let published = transport.published();
    assert_eq!(published.len(), 1);
    let sentence = published[0].text();
    let fields: Vec<&str> = sentence.split(',').collect();
    assert_eq!(fields[0], "$GPRMC");
    assert_eq!(fields[1], "100000");
    assert_eq!(fields[2], "A");
    assert_eq!((fields[3], fields[4]), ("5919.48", "N"));
    assert_eq!((fields[5], fields[6]), ("01804.12", "E"));
    assert_eq!(fields[9], "010124");
    assert_eq!(time.sleeps(), [std::time::Duration::from_secs(1)]);
    assert_eq!(engine.phase(), EnginePhase::Done);
}

#[tokio::test(start_paused = true)]
async fn test_sentence_durations_chain_across_entries() {
    let transport = ScriptedTransport::new();
    let time = RecordingTime::new();
    let scenario = scenario(&with_entries(
        r#"
  - id: start
    content:
      gps: {lat: 1.0, long: 1.0, timestamp: "2024-01-01T10:00:00Z"}
  - id: later
    content:
      gps: {lat: 1.0, long: 1.0, duration: PT5S}
  - id: later-still
    content:
      gps: {lat: 1.0, long: 1.0, duration: 60}
"#,
    ));

    engine(&transport, &time, 0.0)
        .run(&scenario)
        .await
        .expect("run");

    let times: Vec<String> = transport
        .published()
        .iter()
        .map(|p| p.text().split(',').nth(1).unwrap_or_default().to_string())
        .collect();
    assert_eq!(times, ["100000", "100005", "100105"]);
}

#[tokio::test(start_paused = true)]
async fn test_sentence_without_timestamp_uses_wall_clock() {
    let transport = ScriptedTransport::new();
    let time = RecordingTime::new();
    let scenario = scenario(&with_entries(
        r#"
  - id: now
    content:
      gps: {lat: 1.0, long: 1.0}
"#,
    ));

    engine(&transport, &time, 0.0)
        .run(&scenario)
        .await
        .expect("run");

    let sentence = transport.published()[0].text();
    let fields: Vec<&str> = sentence.split(',').collect();
    assert_eq!(fields[1], "120000");
    assert_eq!(fields[9], "010130");
}

#[tokio::test(start_paused = true)]
async fn test_subscriptions_use_declared_qos() {
    let transport = ScriptedTransport::new();
    let time = RecordingTime::new();
    let scenario = scenario(
        r#"
mqtt_publish:
  sensor: {topic: device/sensor, format: json}
mqtt_subscribe:
  status: {topic: backend/status}
  echo: {topic: backend/echo, qos: 0}
testdata: []
"#,
    );

    let mut engine = engine(&transport, &time, 0.0);
    let report = engine.run(&scenario).await.expect("run");

    assert_eq!(
        transport.subscribe_calls(),
        [vec![
            ("backend/status".to_string(), QoS::AtLeastOnce),
            ("backend/echo".to_string(), QoS::AtMostOnce),
        ]]
    );
    assert_eq!(engine.subscriptions().len(), 2);
    assert_eq!(report.entries, 0);
    assert!(report.is_success());
}

#[tokio::test(start_paused = true)]
async fn test_no_subscribe_request_without_subscriptions() {
    let transport = ScriptedTransport::new();
    let time = RecordingTime::new();
    let scenario = scenario(&with_entries("  - id: 1\n"));

    engine(&transport, &time, 0.0)
        .run(&scenario)
        .await
        .expect("run");

    assert!(transport.subscribe_calls().is_empty());
    assert!(transport.published().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_publish_failure_aborts_remaining_entries() {
    let transport = ScriptedTransport::new();
    transport.fail_publish_on("device/gps");
    let time = RecordingTime::new();
    let scenario = scenario(&with_entries(
        r#"
  - id: ok
    content:
      sensor: {battery: 1}
  - id: broken
    content:
      gps: {lat: 1.0, long: 1.0}
  - id: never
    content:
      sensor: {battery: 2}
"#,
    ));

    let mut engine = engine(&transport, &time, 0.0);
    let err = engine.run(&scenario).await.expect_err("publish fails");

    assert!(matches!(
        err,
        PlayerError::Transport(TransportError::Publish { ref topic, .. }) if topic == "device/gps"
    ));
    assert_eq!(transport.published_topics(), ["device/sensor"]);
    assert_eq!(engine.phase(), EnginePhase::Running { index: 1 });
}

#[tokio::test(start_paused = true)]
async fn test_undeclared_channel_rejected_before_publishing() {
    let transport = ScriptedTransport::new();
    let time = RecordingTime::new();
    let scenario = scenario(&with_entries(
        r#"
  - id: ok
    content:
      sensor: {battery: 1}
  - id: bad
    content:
      radar: {range: 3}
"#,
    ));

    let err = engine(&transport, &time, 0.0)
        .run(&scenario)
        .await
        .expect_err("unknown channel");

    assert!(matches!(
        err,
        PlayerError::Scenario(ScenarioError::UnknownChannel { ref channel, .. }) if channel == "radar"
    ));
    assert!(transport.published().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_encoding_error_is_fatal() {
    let transport = ScriptedTransport::new();
    let time = RecordingTime::new();
    let scenario = scenario(&with_entries(
        r#"
  - id: bad
    content:
      gps: {lat: 1.0}
"#,
    ));

    let err = engine(&transport, &time, 0.0)
        .run(&scenario)
        .await
        .expect_err("missing long");

    assert!(matches!(err, PlayerError::Payload(_)));
    assert!(transport.published().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_fixture_scenario_plays_through() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/vehicle.yaml");
    let scenario = rtpusher::Scenario::load(path).expect("fixture loads");
    let transport = ScriptedTransport::new();
    transport.reply_on(
        "vehicle/1/gps",
        "backend/vehicle/1/position",
        r#"{"lat": 59.3293, "long": 18.0686, "source": "gps"}"#,
    );
    let time = RecordingTime::new();

    let report = engine(&transport, &time, 10.0)
        .run(&scenario)
        .await
        .expect("run");

    assert!(report.is_success(), "{report}");
    assert_eq!(
        transport.published_topics(),
        [
            "vehicle/1/gps",
            "vehicle/1/battery",
            "vehicle/1/time",
            "vehicle/1/gps",
            "vehicle/1/gps",
        ]
    );
    assert_eq!(
        time.sleeps(),
        [std::time::Duration::from_secs(1), std::time::Duration::from_secs(1)]
    );
    let last = transport.published()[4].text();
    assert!(last.starts_with("$GPRMC,080020,A,5919.48,N,01804.12,E,"), "{last}");
}

/// JSON behind a version tag, standing in for a site-specific document format.
#[derive(Clone)]
struct TaggedCodec;

impl DocumentCodec for TaggedCodec {
    fn encode(&self, doc: &Document) -> Result<Vec<u8>, CodecError> {
        let mut out = b"v1:".to_vec();
        out.extend(JsonCodec.encode(doc)?);
        Ok(out)
    }

    fn decode(&self, buf: &[u8]) -> Result<Document, CodecError> {
        let body = buf
            .strip_prefix(b"v1:")
            .ok_or_else(|| CodecError::Decode("missing v1 tag".into()))?;
        JsonCodec.decode(body)
    }
}

#[tokio::test(start_paused = true)]
async fn test_engine_uses_supplied_codec_both_ways() {
    let transport = ScriptedTransport::new();
    transport.reply_on("device/sensor", "backend/status", r#"v1:{"battery": 80}"#);
    let time = RecordingTime::new();
    let scenario = scenario(
        r#"
mqtt_publish:
  sensor: {topic: device/sensor, format: json}
mqtt_subscribe:
  status: {topic: backend/status}
testdata:
  - id: tagged
    content:
      sensor: {battery: 80}
    expect:
      status: {battery: 80}
"#,
    );

    let config = PlayerConfig::new(SpeedFactor::UNPACED);
    let mut engine =
        ScenarioEngine::with_codec(transport.clone(), time.clone(), config, TaggedCodec);
    let report = engine.run(&scenario).await.expect("run");

    assert_eq!(transport.published()[0].text(), r#"v1:{"battery":80}"#);
    assert!(report.is_success(), "{report}");
}
