//! Tabular replay of pre-encoded messages.
//!
//! The file is a header line followed by rows of
//! `timestamp,topic,qos,base64-payload`. Rows are published in file order,
//! each delayed by the timestamp delta from the previous row divided by the
//! speed factor. The whole file is parsed before anything is published, so
//! a malformed row aborts the replay without side effects.

use std::path::Path;
use std::time::Instant;

use rtpusher_core::{BrokerTransport, QoS, TimeProvider};

use crate::config::SpeedFactor;
use crate::encoding::b64_decode;
use crate::error::{PlayerError, TabularError};
use crate::report::RunReport;

/// One pre-encoded message.
#[derive(Debug, Clone, PartialEq)]
pub struct TabularRow {
    /// 1-based line number in the source file.
    pub line: usize,
    /// Capture time in seconds; only deltas matter.
    pub timestamp: f64,
    /// Destination topic.
    pub topic: String,
    /// Publish QoS.
    pub qos: QoS,
    /// Decoded payload bytes.
    pub payload: Vec<u8>,
}

/// Parse tabular text, discarding the first line as a header.
///
/// Every following line must be a row; a blank line is malformed.
pub fn parse_rows(text: &str) -> Result<Vec<TabularRow>, TabularError> {
    text.lines()
        .enumerate()
        .skip(1)
        .map(|(index, line)| parse_row(index + 1, line))
        .collect()
}

/// Read and parse a tabular file.
pub fn load_rows(path: impl AsRef<Path>) -> Result<Vec<TabularRow>, TabularError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| TabularError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_rows(&text)
}

fn parse_row(line: usize, text: &str) -> Result<TabularRow, TabularError> {
    let fields: Vec<&str> = text.trim_end().split(',').collect();
    let [timestamp, topic, qos, payload] = fields[..] else {
        return Err(TabularError::FieldCount {
            line,
            found: fields.len(),
        });
    };

    let timestamp = timestamp
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|t| t.is_finite())
        .ok_or_else(|| TabularError::InvalidTimestamp {
            line,
            value: timestamp.to_string(),
        })?;
    let qos = qos
        .trim()
        .parse::<u8>()
        .ok()
        .and_then(|level| QoS::try_from(level).ok())
        .ok_or_else(|| TabularError::InvalidQoS {
            line,
            value: qos.to_string(),
        })?;
    let payload = b64_decode(payload.trim())
        .map_err(|source| TabularError::InvalidPayload { line, source })?;

    Ok(TabularRow {
        line,
        timestamp,
        topic: topic.trim().to_string(),
        qos,
        payload,
    })
}

/// Publish `rows` in order, pacing by timestamp deltas.
///
/// The first row is published immediately. Negative deltas do not pause.
pub async fn replay_rows<T, P>(
    transport: &mut T,
    time: &P,
    speed: SpeedFactor,
    rows: &[TabularRow],
) -> Result<RunReport, PlayerError>
where
    T: BrokerTransport,
    P: TimeProvider,
{
    let started = Instant::now();
    let mut report = RunReport::default();
    let mut previous: Option<f64> = None;

    for row in rows {
        if let Some(delay) = previous.and_then(|last| speed.scale(row.timestamp - last)) {
            tracing::info!("Sleeping for {:.3} seconds", delay.as_secs_f64());
            time.sleep(delay).await;
        }
        tracing::info!(line = row.line, "Topic {}, {} bytes", row.topic, row.payload.len());
        transport
            .publish(&row.topic, row.payload.clone(), row.qos)
            .await?;
        report.published += 1;
        report.entries += 1;
        previous = Some(row.timestamp);
    }

    report.elapsed = started.elapsed();
    tracing::info!("Replayed {} messages", report.published);
    Ok(report)
}
