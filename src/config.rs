//! Session configuration.
//!
//! Every timing and bound used by the simulator lives here with its default
//! value, so a deployment can retune the page from a TOML file without
//! touching code. Missing keys fall back to the defaults.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Tunables for one mounted chat session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Display name of the simulated host.
    pub host_name: String,
    /// Delay from mount to the welcome message.
    pub welcome_delay_ms: u64,
    pub burst_min: usize,
    pub burst_max: usize,
    /// Gap between consecutive burst messages, drawn uniformly.
    pub burst_gap_min_ms: u64,
    pub burst_gap_max_ms: u64,
    /// Delay between a scripted question and the host typing indicator.
    pub script_typing_lead_ms: u64,
    pub script_typing_min_ms: u64,
    pub script_typing_max_ms: u64,
    /// Human-latency delay before a reply request is issued.
    pub reply_delay_min_ms: u64,
    pub reply_delay_max_ms: u64,
    pub toast_interval_min_ms: u64,
    pub toast_interval_max_ms: u64,
    pub toast_lifetime_ms: u64,
    pub viewer_tick_ms: u64,
    pub viewer_min: u32,
    pub viewer_max: u32,
    pub viewer_initial: u32,
    /// Delay from mount until the special offer opens.
    pub offer_delay_ms: u64,
    pub offer_duration_secs: u32,
    /// Navigation target of the "Invest" action.
    pub offer_url: String,
    pub scroll_threshold_px: f64,
    pub row_height_px: f64,
    pub viewport_height_px: f64,
    pub responder_url: Option<String>,
    pub realtime_url: Option<String>,
    /// Fixed RNG seed for reproducible synthetic content.
    pub seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host_name: "Sarah (Host)".to_string(),
            welcome_delay_ms: 2_000,
            burst_min: 15,
            burst_max: 20,
            burst_gap_min_ms: 500,
            burst_gap_max_ms: 1_500,
            script_typing_lead_ms: 1_200,
            script_typing_min_ms: 10_000,
            script_typing_max_ms: 20_000,
            reply_delay_min_ms: 1_500,
            reply_delay_max_ms: 4_000,
            toast_interval_min_ms: 30_000,
            toast_interval_max_ms: 60_000,
            toast_lifetime_ms: 5_000,
            viewer_tick_ms: 5_000,
            viewer_min: 40,
            viewer_max: 50,
            viewer_initial: 45,
            offer_delay_ms: 60_000,
            offer_duration_secs: 600,
            offer_url: "https://example.com/invest".to_string(),
            scroll_threshold_px: 50.0,
            row_height_px: 56.0,
            viewport_height_px: 480.0,
            responder_url: None,
            realtime_url: None,
            seed: None,
        }
    }
}

impl SessionConfig {
    /// Parse a config from TOML text. Absent keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, SessionError> {
        toml::from_str(text).map_err(|source| SessionError::ConfigParse {
            path: "<inline>".to_string(),
            source,
        })
    }

    /// Read and parse a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|source| SessionError::ConfigIo {
            path: display.clone(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| SessionError::ConfigParse {
            path: display,
            source,
        })
    }

    /// Reject configs whose ranges are inverted or whose periods are zero.
    pub fn validate(&self) -> Result<(), SessionError> {
        let ranges = [
            ("burst", self.burst_min as u64, self.burst_max as u64),
            ("burst_gap_ms", self.burst_gap_min_ms, self.burst_gap_max_ms),
            ("script_typing_ms", self.script_typing_min_ms, self.script_typing_max_ms),
            ("reply_delay_ms", self.reply_delay_min_ms, self.reply_delay_max_ms),
            ("toast_interval_ms", self.toast_interval_min_ms, self.toast_interval_max_ms),
            ("viewer", u64::from(self.viewer_min), u64::from(self.viewer_max)),
        ];
        for (name, min, max) in ranges {
            if min > max {
                return Err(SessionError::InvalidConfig(format!(
                    "{name}: min {min} is greater than max {max}"
                )));
            }
        }
        if !(self.viewer_min..=self.viewer_max).contains(&self.viewer_initial) {
            return Err(SessionError::InvalidConfig(format!(
                "viewer_initial {} outside [{}, {}]",
                self.viewer_initial, self.viewer_min, self.viewer_max
            )));
        }
        if self.viewer_tick_ms == 0 || self.toast_interval_min_ms == 0 {
            return Err(SessionError::InvalidConfig(
                "periodic intervals must be non-zero".to_string(),
            ));
        }
        if self.offer_duration_secs == 0 {
            return Err(SessionError::InvalidConfig(
                "offer_duration_secs must be non-zero".to_string(),
            ));
        }
        if self.row_height_px <= 0.0 || self.viewport_height_px <= 0.0 {
            return Err(SessionError::InvalidConfig(
                "viewport geometry must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn welcome_delay(&self) -> Duration {
        Duration::from_millis(self.welcome_delay_ms)
    }

    pub fn script_typing_lead(&self) -> Duration {
        Duration::from_millis(self.script_typing_lead_ms)
    }

    pub fn toast_lifetime(&self) -> Duration {
        Duration::from_millis(self.toast_lifetime_ms)
    }

    pub fn viewer_tick(&self) -> Duration {
        Duration::from_millis(self.viewer_tick_ms)
    }

    pub fn offer_delay(&self) -> Duration {
        Duration::from_millis(self.offer_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        tokio_test::assert_ok!(SessionConfig::default().validate());
    }

    #[test]
    fn defaults_match_page_timings() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.welcome_delay(), Duration::from_secs(2));
        assert_eq!(cfg.viewer_tick(), Duration::from_secs(5));
        assert_eq!(cfg.offer_delay(), Duration::from_secs(60));
        assert_eq!(cfg.offer_duration_secs, 600);
        assert_eq!((cfg.viewer_min, cfg.viewer_max), (40, 50));
        assert_eq!(cfg.scroll_threshold_px, 50.0);
    }

    #[test]
    fn toml_partial_keeps_defaults() {
        let cfg = SessionConfig::from_toml_str("host_name = \"Mia\"\nseed = 7\n").unwrap();
        assert_eq!(cfg.host_name, "Mia");
        assert_eq!(cfg.seed, Some(7));
        assert_eq!(cfg.burst_min, 15);
    }

    #[test]
    fn toml_type_error_is_parse_error() {
        let err = SessionConfig::from_toml_str("burst_min = \"many\"").unwrap_err();
        assert!(matches!(err, SessionError::ConfigParse { .. }));
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "offer_duration_secs = 30").unwrap();
        writeln!(file, "realtime_url = \"ws://127.0.0.1:8890/feed\"").unwrap();
        let cfg = SessionConfig::load(file.path()).unwrap();
        assert_eq!(cfg.offer_duration_secs, 30);
        assert_eq!(cfg.realtime_url.as_deref(), Some("ws://127.0.0.1:8890/feed"));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SessionConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, SessionError::ConfigIo { .. }));
    }

    #[rstest]
    #[case::burst(|c: &mut SessionConfig| { c.burst_min = 30; })]
    #[case::reply(|c: &mut SessionConfig| { c.reply_delay_min_ms = 9_000; })]
    #[case::viewer_initial(|c: &mut SessionConfig| { c.viewer_initial = 51; })]
    #[case::viewer_tick(|c: &mut SessionConfig| { c.viewer_tick_ms = 0; })]
    #[case::offer(|c: &mut SessionConfig| { c.offer_duration_secs = 0; })]
    #[case::geometry(|c: &mut SessionConfig| { c.row_height_px = 0.0; })]
    fn validate_rejects(#[case] tweak: fn(&mut SessionConfig)) {
        let mut cfg = SessionConfig::default();
        tweak(&mut cfg);
        assert!(matches!(cfg.validate(), Err(SessionError::InvalidConfig(_))));
    }
}
