//! rtpusher - MQTT based realtime data simulator.
//!
//! # Usage
//!
//! Replay a scenario at double speed against a local broker:
//! ```bash
//! rtpusher --speed 2 feed.yaml
//! ```
//!
//! Replay a capture as fast as possible, forever:
//! ```bash
//! rtpusher --server broker.local:1883 --format tabular --speed 0 --loop capture.csv
//! ```
//!
//! Exit status is 0 on success, 1 on a fatal error and 2 when a scenario
//! finished with expectation errors.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use rtpusher::{
    BrokerConfig, MqttTransport, PlayerConfig, PlayerError, RunReport, Scenario, ScenarioEngine,
    SpeedFactor,
};
use rtpusher_core::{BrokerAddress, BrokerTransport, TokioTimeProvider};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Input file layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum InputFormat {
    /// YAML scenario with expectations.
    #[value(alias = "yaml")]
    Scenario,
    /// CSV of timestamp,topic,qos,base64-payload rows.
    #[value(alias = "csv")]
    Tabular,
}

/// CLI arguments
#[derive(Parser, Debug)]
#[command(name = "rtpusher")]
#[command(about = "MQTT based realtime data simulator", long_about = None)]
struct Args {
    /// MQTT broker, as host or host:port
    #[arg(long, value_name = "SERVER", default_value = "127.0.0.1")]
    server: BrokerAddress,

    /// Speed factor (0 disables pacing)
    #[arg(long, value_name = "FACTOR", default_value = "1")]
    speed: SpeedFactor,

    /// Loop forever
    #[arg(long = "loop")]
    repeat: bool,

    /// Enable debugging
    #[arg(long)]
    debug: bool,

    /// Input data format
    #[arg(long, value_enum, default_value_t = InputFormat::Scenario)]
    format: InputFormat,

    /// Override the scenario's expectation timeout, in seconds
    #[arg(long, value_name = "SECONDS", value_parser = parse_timeout)]
    timeout: Option<Duration>,

    /// Testdata file
    filename: PathBuf,
}

fn parse_timeout(s: &str) -> Result<Duration, String> {
    let seconds: f64 = s.parse().map_err(|_| format!("invalid timeout {s:?}"))?;
    Duration::try_from_secs_f64(seconds).map_err(|e| format!("invalid timeout {s:?}: {e}"))
}

fn init_tracing(debug: bool) {
    let default_filter = if debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.debug);

    match run(args).await {
        Ok(report) if report.is_success() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(2),
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<RunReport, PlayerError> {
    let mut config = PlayerConfig::new(args.speed).with_repeat(args.repeat);
    if let Some(timeout) = args.timeout {
        config = config.with_expect_timeout(timeout);
    }
    let time = TokioTimeProvider::new();

    match args.format {
        InputFormat::Scenario => {
            let scenario = Scenario::load(&args.filename)?;
            // The engine validates again on each pass; this one fails before
            // a broker connection is opened.
            scenario.validate()?;
            let transport = MqttTransport::connect(&BrokerConfig::new(args.server)).await?;
            let repeat = config.repeat;
            let mut engine = ScenarioEngine::new(transport, time, config);
            let report = loop {
                let report = engine.run(&scenario).await?;
                tracing::debug!("\n{report}");
                if !repeat {
                    break report;
                }
            };
            engine.into_transport().disconnect().await?;
            Ok(report)
        }
        InputFormat::Tabular => {
            let rows = rtpusher::load_rows(&args.filename)?;
            let mut transport = MqttTransport::connect(&BrokerConfig::new(args.server)).await?;
            let report = loop {
                let report = rtpusher::replay_rows(&mut transport, &time, config.speed, &rows).await?;
                if !config.repeat {
                    break report;
                }
            };
            transport.disconnect().await?;
            Ok(report)
        }
    }
}
