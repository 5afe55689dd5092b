//! Configuration structures for the player and its broker connection.

use std::time::Duration;

use rtpusher_core::BrokerAddress;

/// Replay speed multiplier applied to every declared delay.
///
/// Values above 1 accelerate replay, values below 1 slow it down, and zero
/// disables pacing entirely.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedFactor(f64);

impl SpeedFactor {
    /// Real-time replay.
    pub const REALTIME: SpeedFactor = SpeedFactor(1.0);

    /// No pacing at all: run as fast as the transport allows.
    pub const UNPACED: SpeedFactor = SpeedFactor(0.0);

    /// Create a speed factor, rejecting negative and non-finite values.
    pub fn new(factor: f64) -> Option<Self> {
        (factor.is_finite() && factor >= 0.0).then_some(Self(factor))
    }

    /// The raw multiplier.
    pub fn get(self) -> f64 {
        self.0
    }

    /// Whether pacing is disabled.
    pub fn is_unpaced(self) -> bool {
        self.0 == 0.0
    }

    /// Scale a declared delay in seconds to the pause to actually take.
    ///
    /// Returns `None` when pacing is disabled or the scaled delay is not
    /// positive.
    pub fn scale(self, seconds: f64) -> Option<Duration> {
        if self.is_unpaced() {
            return None;
        }
        let delay = seconds / self.0;
        if delay > 0.0 {
            Duration::try_from_secs_f64(delay).ok()
        } else {
            None
        }
    }
}

impl Default for SpeedFactor {
    fn default() -> Self {
        Self::REALTIME
    }
}

impl std::str::FromStr for SpeedFactor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let factor: f64 = s
            .trim()
            .parse()
            .map_err(|_| format!("invalid speed factor {s:?}"))?;
        SpeedFactor::new(factor).ok_or_else(|| format!("speed factor must be >= 0, got {s}"))
    }
}

impl std::fmt::Display for SpeedFactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x", self.0)
    }
}

/// Configuration for a replay run.
#[derive(Clone, Debug, Default)]
pub struct PlayerConfig {
    /// Pacing multiplier for entry sleeps and tabular timestamp deltas.
    pub speed: SpeedFactor,

    /// Overrides the scenario's expectation timeout when set.
    pub expect_timeout: Option<Duration>,

    /// Repeat the replay until a fatal error occurs.
    pub repeat: bool,
}

impl PlayerConfig {
    /// Create a configuration with the given speed and no overrides.
    pub fn new(speed: SpeedFactor) -> Self {
        Self {
            speed,
            ..Self::default()
        }
    }

    /// Override the scenario's expectation timeout.
    pub fn with_expect_timeout(mut self, timeout: Duration) -> Self {
        self.expect_timeout = Some(timeout);
        self
    }

    /// Repeat the replay forever.
    pub fn with_repeat(mut self, repeat: bool) -> Self {
        self.repeat = repeat;
        self
    }
}

/// Configuration for the MQTT broker session.
#[derive(Clone, Debug)]
pub struct BrokerConfig {
    /// Broker to connect to.
    pub address: BrokerAddress,

    /// MQTT client identifier.
    pub client_id: String,

    /// Keep-alive interval negotiated with the broker.
    pub keep_alive: Duration,

    /// Maximum time to wait for the broker's CONNACK.
    pub connect_timeout: Duration,

    /// Number of outgoing requests buffered before publish calls wait.
    pub request_capacity: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            address: BrokerAddress::default(),
            client_id: random_client_id(),
            keep_alive: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            request_capacity: 64,
        }
    }
}

impl BrokerConfig {
    /// Create a configuration for the given broker with default settings.
    pub fn new(address: BrokerAddress) -> Self {
        Self {
            address,
            ..Self::default()
        }
    }

    /// Use a fixed client identifier instead of a random one.
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }
}

fn random_client_id() -> String {
    format!("rtpusher-{:08x}", rand::random::<u32>())
}
