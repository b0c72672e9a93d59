use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

pub const RENDER_INTERVAL_ENV: &str = "FILTER_ENGINE_RENDER_INTERVAL_MS";
pub const POWER_PREFERENCE_ENV: &str = "FILTER_ENGINE_POWER";

/// Minimum spacing between two non-forced renders.
pub const DEFAULT_RENDER_INTERVAL: Duration = Duration::from_millis(30);
const DEFAULT_THREAD_NAME: &str = "filter-engine-render";

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
/// Persisted engine settings. Every field is optional and falls back to a default.
pub struct EngineConfig {
    pub render_interval_ms: Option<u64>,
    /// `"high"` or `"low"`.
    pub power_preference: Option<String>,
    pub thread_name: Option<String>,
}

impl EngineConfig {
    /// Returns the user config file path, if a config directory is available.
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("filter-engine").join("config.toml"))
    }

    /// Loads config from disk, falling back to defaults on any error.
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        let Ok(contents) = std::fs::read_to_string(&path) else {
            return Self::default();
        };
        toml::from_str(&contents).unwrap_or_default()
    }

    /// Writes config to disk, ignoring filesystem/serialization errors.
    pub fn save(&self) {
        let Some(path) = Self::config_path() else {
            return;
        };
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Ok(s) = toml::to_string_pretty(self) {
            let _ = std::fs::write(&path, s);
        }
    }

    /// Render coalescing window: environment, then config file, then 30 ms.
    pub fn render_interval(&self) -> Duration {
        if let Some(ms) = std::env::var(RENDER_INTERVAL_ENV)
            .ok()
            .and_then(|raw| parse_interval_ms(&raw))
        {
            return Duration::from_millis(ms);
        }
        self.render_interval_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_RENDER_INTERVAL)
    }

    pub fn power_preference(&self) -> wgpu::PowerPreference {
        if let Ok(raw) = std::env::var(POWER_PREFERENCE_ENV) {
            return parse_power_preference(&raw);
        }
        self.power_preference
            .as_deref()
            .map(parse_power_preference)
            .unwrap_or(wgpu::PowerPreference::HighPerformance)
    }

    pub fn thread_name(&self) -> String {
        self.thread_name
            .clone()
            .unwrap_or_else(|| DEFAULT_THREAD_NAME.to_string())
    }
}

fn parse_interval_ms(raw: &str) -> Option<u64> {
    raw.trim().parse::<u64>().ok()
}

fn parse_power_preference(value: &str) -> wgpu::PowerPreference {
    match value.trim().to_ascii_lowercase().as_str() {
        "low" | "low_power" | "lowpower" => wgpu::PowerPreference::LowPower,
        "none" => wgpu::PowerPreference::None,
        _ => wgpu::PowerPreference::HighPerformance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let config: EngineConfig = toml::from_str("thread_name = \"editor\"").unwrap();
        assert_eq!(config.thread_name(), "editor");
        assert_eq!(config.render_interval_ms, None);
        assert_eq!(config.power_preference, None);
    }

    #[test]
    fn toml_round_trip() {
        let config = EngineConfig {
            render_interval_ms: Some(16),
            power_preference: Some("low".to_string()),
            thread_name: None,
        };
        let text = toml::to_string_pretty(&config).unwrap();
        let back: EngineConfig = toml::from_str(&text).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn power_preference_parser_accepts_aliases() {
        assert_eq!(
            parse_power_preference(" LOW "),
            wgpu::PowerPreference::LowPower
        );
        assert_eq!(
            parse_power_preference("low_power"),
            wgpu::PowerPreference::LowPower
        );
        assert_eq!(parse_power_preference("none"), wgpu::PowerPreference::None);
        assert_eq!(
            parse_power_preference("whatever"),
            wgpu::PowerPreference::HighPerformance
        );
    }

    #[test]
    fn interval_parser_rejects_garbage() {
        assert_eq!(parse_interval_ms(" 45 "), Some(45));
        assert_eq!(parse_interval_ms("fast"), None);
        assert_eq!(parse_interval_ms("-3"), None);
    }
}
