use std::time::Duration;

use config::Config;
use serde::Deserialize;

use crate::error::Result;

const CONFIG_FILE: &str = "carrier-intel";
const ENV_PREFIX: &str = "CARRIER";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api: ApiSettings,
    pub capture: CaptureSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".into(),
            endpoint: "/api/admin/carrier-health/auto-scrape".into(),
            timeout_secs: 120,
        }
    }
}

impl ApiSettings {
    pub fn url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.endpoint.trim_start_matches('/')
        )
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Timing of the guided capture loop.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    pub poll_interval_ms: u64,
    pub extract_window_ms: u64,
    pub detect_timeout_secs: u64,
    pub first_step_delay_ms: u64,
    /// Pause after a detected heading change before reading values
    pub settle_delay_ms: u64,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 150,
            extract_window_ms: 4000,
            detect_timeout_secs: 120,
            first_step_delay_ms: 1000,
            settle_delay_ms: 800,
        }
    }
}

impl CaptureSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn extract_window(&self) -> Duration {
        Duration::from_millis(self.extract_window_ms)
    }

    pub fn detect_timeout(&self) -> Duration {
        Duration::from_secs(self.detect_timeout_secs)
    }

    pub fn first_step_delay(&self) -> Duration {
        Duration::from_millis(self.first_step_delay_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl Settings {
    /// Defaults, then `carrier-intel.toml` if present, then `CARRIER_*` env vars.
    pub fn load() -> Result<Self> {
        let settings = Config::builder()
            .add_source(config::File::with_name(CONFIG_FILE).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}

// ── Tests ──
