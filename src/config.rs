use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use crate::remote::settings::RemoteControlSettings;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub enable_file_logs: bool,
    pub log_dir: String,
    pub cors_origin: String,
    pub limits: LimitsConfig,
    pub remote: RemoteEnvConfig,
}

#[derive(Debug, Clone)]
pub struct LimitsConfig {
    /// Period of the no-op flush tick that resolves lapsed windows.
    pub flush_interval_ms: u64,
    pub max_frames_per_request: usize,
    pub max_sse_connections: usize,
    pub event_channel_capacity: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            flush_interval_ms: 100,
            max_frames_per_request: 240,
            max_sse_connections: 16,
            event_channel_capacity: 256,
        }
    }
}

/// Initial remote control settings; the settings endpoint can change them
/// at runtime.
#[derive(Debug, Clone)]
pub struct RemoteEnvConfig {
    pub enabled: bool,
    pub sensitivity: i32,
    pub gaze_hold_time_ms: i64,
    pub edge_threshold: f64,
    pub blink_pattern_timeout_ms: i64,
    pub rapid_movement_enabled: bool,
}

impl Default for RemoteEnvConfig {
    fn default() -> Self {
        let d = RemoteControlSettings::default();
        Self {
            enabled: d.enabled,
            sensitivity: d.sensitivity,
            gaze_hold_time_ms: d.gaze_hold_time_ms,
            edge_threshold: d.edge_threshold,
            blink_pattern_timeout_ms: d.blink_pattern_timeout_ms,
            rapid_movement_enabled: d.rapid_movement_enabled,
        }
    }
}

impl RemoteEnvConfig {
    pub fn to_settings(&self) -> RemoteControlSettings {
        let settings = RemoteControlSettings {
            enabled: self.enabled,
            sensitivity: self.sensitivity,
            gaze_hold_time_ms: self.gaze_hold_time_ms,
            edge_threshold: self.edge_threshold,
            blink_pattern_timeout_ms: self.blink_pattern_timeout_ms,
            rapid_movement_enabled: self.rapid_movement_enabled,
            ..RemoteControlSettings::default()
        };
        settings.sanitized().0
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = RemoteEnvConfig::default();
        let limits = LimitsConfig::default();
        Self {
            host: env_or_parse("HOST", IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))),
            port: env_or_parse("PORT", 3100_u16),
            log_level: env_or("RUST_LOG", "info"),
            enable_file_logs: env_or_bool("ENABLE_FILE_LOGS", false),
            log_dir: env_or("LOG_DIR", "./logs"),
            cors_origin: env_or("CORS_ORIGIN", "http://localhost:5173"),
            limits: LimitsConfig {
                flush_interval_ms: env_or_parse("FLUSH_INTERVAL_MS", limits.flush_interval_ms).max(10),
                max_frames_per_request: env_or_parse(
                    "MAX_FRAMES_PER_REQUEST",
                    limits.max_frames_per_request,
                ),
                max_sse_connections: env_or_parse("MAX_SSE_CONNECTIONS", limits.max_sse_connections),
                event_channel_capacity: env_or_parse(
                    "EVENT_CHANNEL_CAPACITY",
                    limits.event_channel_capacity,
                )
                .max(1),
            },
            remote: RemoteEnvConfig {
                enabled: env_or_bool("REMOTE_ENABLED", defaults.enabled),
                sensitivity: env_or_parse("REMOTE_SENSITIVITY", defaults.sensitivity),
                gaze_hold_time_ms: env_or_parse("REMOTE_GAZE_HOLD_MS", defaults.gaze_hold_time_ms),
                edge_threshold: env_or_parse("REMOTE_EDGE_THRESHOLD", defaults.edge_threshold),
                blink_pattern_timeout_ms: env_or_parse(
                    "REMOTE_BLINK_TIMEOUT_MS",
                    defaults.blink_pattern_timeout_ms,
                ),
                rapid_movement_enabled: env_or_bool(
                    "REMOTE_RAPID_MOVEMENT",
                    defaults.rapid_movement_enabled,
                ),
            },
        }
    }
}

pub fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

pub fn env_or_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    match env::var(key) {
        Ok(raw) => match raw.parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(
                    key,
                    value = %raw,
                    "Failed to parse env var, using default"
                );
                default
            }
        },
        Err(_) => default,
    }
}

pub fn env_or_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Mutex, OnceLock};

    use super::*;

    fn env_lock() -> &'static Mutex<()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
    }

    fn managed_keys() -> &'static [&'static str] {
        &[
            "HOST",
            "PORT",
            "RUST_LOG",
            "FLUSH_INTERVAL_MS",
            "MAX_SSE_CONNECTIONS",
            "REMOTE_ENABLED",
            "REMOTE_SENSITIVITY",
            "REMOTE_GAZE_HOLD_MS",
        ]
    }

    fn clear_keys(keys: &[&str]) {
        for key in keys {
            env::remove_var(key);
        }
    }

    #[test]
    fn loads_defaults_when_missing() {
        let _guard = env_lock().lock().expect("env lock");
        clear_keys(managed_keys());

        let cfg = Config::from_env();
        assert_eq!(cfg.port, 3100);
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.limits.flush_interval_ms, 100);
        assert!(cfg.remote.enabled);
        assert_eq!(cfg.remote.to_settings(), RemoteControlSettings::default());
    }

    #[test]
    fn parses_numeric_values() {
        let _guard = env_lock().lock().expect("env lock");
        clear_keys(managed_keys());

        env::set_var("PORT", "4000");
        env::set_var("MAX_SSE_CONNECTIONS", "3");
        env::set_var("REMOTE_SENSITIVITY", "8");

        let cfg = Config::from_env();
        assert_eq!(cfg.port, 4000);
        assert_eq!(cfg.limits.max_sse_connections, 3);
        assert_eq!(cfg.remote.to_settings().sensitivity, 8);
    }

    #[test]
    fn invalid_values_fall_back() {
        let _guard = env_lock().lock().expect("env lock");
        clear_keys(managed_keys());

        env::set_var("PORT", "bad");
        env::set_var("FLUSH_INTERVAL_MS", "soon");

        let cfg = Config::from_env();
        assert_eq!(cfg.port, 3100);
        assert_eq!(cfg.limits.flush_interval_ms, 100);
    }

    #[test]
    fn out_of_range_remote_values_are_clamped() {
        let _guard = env_lock().lock().expect("env lock");
        clear_keys(managed_keys());

        env::set_var("REMOTE_ENABLED", "off");
        env::set_var("REMOTE_GAZE_HOLD_MS", "-5");

        let settings = Config::from_env().remote.to_settings();
        assert!(!settings.enabled);
        assert_eq!(settings.gaze_hold_time_ms, 100);
    }
}
