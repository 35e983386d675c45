use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Parameters required to establish a connection to the debugger server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectParams {
    pub host: String,
    pub port: u16,

    /// Connection timeout. Applied during the initial connection attempt.
    #[serde(with = "serde_duration_ms", default = "default_connect_timeout")]
    pub connect_timeout: Duration,
}

impl ConnectParams {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        ConnectParams {
            host: host.into(),
            port,
            connect_timeout: default_connect_timeout(),
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(5)
}

// Module for serializing/deserializing Duration to/from milliseconds
pub(crate) mod serde_duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
