//! Client configuration

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Slack the lease keeps beyond one heartbeat interval
pub const MIN_LEASE_SLACK: Duration = Duration::from_secs(2);

/// Registry client configuration.
///
/// Durations are written in seconds in configuration files. `ttl` must be
/// a whole number of seconds because lease expiries are Unix timestamps;
/// the other two accept fractions (e.g., `touch_interval: 0.5`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Registry base address (e.g., "http://127.0.0.1:20080")
    pub addr: String,
    /// Shared secret sent with every request
    #[serde(default)]
    pub secret: String,
    /// Lease duration granted on each registration or touch
    #[serde(default = "default_ttl", with = "seconds")]
    pub ttl: Duration,
    /// Heartbeat period
    #[serde(default = "default_touch_interval", with = "seconds")]
    pub touch_interval: Duration,
    /// Per-request deadline
    #[serde(default = "default_timeout", with = "seconds")]
    pub timeout: Duration,
}

fn default_ttl() -> Duration {
    Duration::from_secs(10)
}

fn default_touch_interval() -> Duration {
    Duration::from_secs(8)
}

fn default_timeout() -> Duration {
    Duration::from_secs(5)
}

mod seconds {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Seconds {
        Whole(u64),
        Fractional(f64),
    }

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        if value.subsec_nanos() == 0 {
            serializer.serialize_u64(value.as_secs())
        } else {
            serializer.serialize_f64(value.as_secs_f64())
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        match Seconds::deserialize(deserializer)? {
            Seconds::Whole(secs) => Ok(Duration::from_secs(secs)),
            Seconds::Fractional(secs) => Duration::try_from_secs_f64(secs).map_err(D::Error::custom),
        }
    }
}

/// Reject durations too large for the monotonic clock to schedule
fn schedulable(name: &str, value: Duration) -> Result<()> {
    match Instant::now().checked_add(value) {
        Some(_) => Ok(()),
        None => Err(Error::configuration(format!(
            "{name} ({value:?}) is too large to schedule"
        ))),
    }
}

impl ClientConfig {
    /// Create a configuration with default lease parameters
    pub fn new(addr: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            secret: secret.into(),
            ttl: default_ttl(),
            touch_interval: default_touch_interval(),
            timeout: default_timeout(),
        }
    }

    /// Set the lease duration
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the heartbeat period
    pub fn with_touch_interval(mut self, touch_interval: Duration) -> Self {
        self.touch_interval = touch_interval;
        self
    }

    /// Set the per-request deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Load configuration from file
    pub async fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = async_fs::read_to_string(path).await?;

        // YAML by extension, JSON otherwise
        match path.extension().and_then(|s| s.to_str()) {
            Some("yaml") | Some("yml") => Ok(serde_yaml::from_str(&contents)?),
            _ => Ok(serde_json::from_str(&contents)?),
        }
    }

    /// Check the lease parameters and registry address.
    ///
    /// The heartbeat must fire at least [`MIN_LEASE_SLACK`] before the lease
    /// it renews would expire.
    pub fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.addr)
            .map_err(|e| Error::configuration(format!("invalid addr {:?}: {}", self.addr, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::configuration(format!(
                "addr must use http or https, got {:?}",
                url.scheme()
            )));
        }

        if self.touch_interval.is_zero() {
            return Err(Error::configuration("touch_interval must be positive"));
        }
        if self.timeout.is_zero() {
            return Err(Error::configuration("timeout must be positive"));
        }
        schedulable("touch_interval", self.touch_interval)?;
        schedulable("timeout", self.timeout)?;
        if self.ttl.subsec_nanos() != 0 {
            return Err(Error::configuration(format!(
                "ttl must be a whole number of seconds, got {:?}",
                self.ttl
            )));
        }

        let max_interval = self.ttl.checked_sub(MIN_LEASE_SLACK).ok_or_else(|| {
            Error::configuration(format!(
                "ttl must be at least {}s, got {:?}",
                MIN_LEASE_SLACK.as_secs(),
                self.ttl
            ))
        })?;
        if self.touch_interval > max_interval {
            return Err(Error::configuration(format!(
                "touch_interval ({:?}) must be at least {}s shorter than ttl ({:?})",
                self.touch_interval,
                MIN_LEASE_SLACK.as_secs(),
                self.ttl
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn config(ttl: u64, interval: u64) -> ClientConfig {
        ClientConfig::new("http://127.0.0.1:20080", "123456")
            .with_ttl(Duration::from_secs(ttl))
            .with_touch_interval(Duration::from_secs(interval))
    }

    #[test]
    fn test_interval_boundary() {
        assert!(config(10, 8).validate().is_ok());
        assert!(config(10, 1).validate().is_ok());
        let err = config(10, 9).validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_ttl_too_short() {
        assert!(config(1, 1).validate().is_err());
        let fast = ClientConfig::new("http://localhost", "")
            .with_ttl(Duration::from_secs(3))
            .with_touch_interval(Duration::from_millis(100));
        assert!(fast.validate().is_ok());
    }

    #[test]
    fn test_ttl_whole_seconds() {
        let cfg = ClientConfig::new("http://localhost", "")
            .with_ttl(Duration::from_millis(2100))
            .with_touch_interval(Duration::from_millis(100));
        let err = cfg.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("whole number of seconds"));
    }

    #[test]
    fn test_unschedulable_durations() {
        let yaml = "addr: http://127.0.0.1:20080\nttl: 18446744073709551615\ntouch_interval: 18446744073709551000\n";
        let cfg: ClientConfig = serde_yaml::from_str(yaml).unwrap();
        let err = cfg.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("touch_interval"));

        let cfg = config(10, 8).with_timeout(Duration::from_secs(u64::MAX));
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("timeout"));
    }

    #[test]
    fn test_fractional_seconds() {
        let parsed: ClientConfig = serde_yaml::from_str(
            "addr: http://127.0.0.1:20080\nttl: 3\ntouch_interval: 0.5\ntimeout: 0.25\n",
        )
        .unwrap();
        assert_eq!(parsed.ttl, Duration::from_secs(3));
        assert_eq!(parsed.touch_interval, Duration::from_millis(500));
        assert_eq!(parsed.timeout, Duration::from_millis(250));
        parsed.validate().unwrap();

        let yaml = serde_yaml::to_string(&parsed).unwrap();
        assert!(yaml.contains("ttl: 3\n"));
        assert!(yaml.contains("touch_interval: 0.5"));

        assert!(serde_yaml::from_str::<ClientConfig>("addr: http://r:1\ntimeout: -1.0\n").is_err());
    }

    #[test]
    fn test_addr_and_timeout() {
        let mut cfg = config(10, 8);
        cfg.addr = "127.0.0.1:20080".to_string();
        assert!(cfg.validate().is_err());
        cfg.addr = "ftp://127.0.0.1".to_string();
        assert!(cfg.validate().is_err());

        let cfg = config(10, 8).with_timeout(Duration::ZERO);
        assert!(cfg.validate().is_err());
        let cfg = config(10, 8).with_touch_interval(Duration::ZERO);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = config(10, 8);
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("touch_interval: 8"));
        let parsed: ClientConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_defaults_applied() {
        let parsed: ClientConfig = serde_json::from_str(r#"{"addr":"http://r:1"}"#).unwrap();
        assert_eq!(parsed.ttl, Duration::from_secs(10));
        assert_eq!(parsed.touch_interval, Duration::from_secs(8));
        assert_eq!(parsed.timeout, Duration::from_secs(5));
        assert!(parsed.secret.is_empty());
    }

    #[test]
    fn test_from_file() {
        smol::block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("client.yaml");
            async_fs::write(
                &path,
                "addr: http://127.0.0.1:20080\nsecret: \"123456\"\nttl: 10\ntouch_interval: 8\ntimeout: 5\n",
            )
            .await
            .unwrap();

            let config = ClientConfig::from_file(&path).await.unwrap();
            assert_eq!(config.secret, "123456");
            assert_eq!(config.timeout, Duration::from_secs(5));
            config.validate().unwrap();
        });
    }
}
