// Configuration for the server, read from the environment

use std::{path::PathBuf, time::Duration};

use xtts_core::{DevicePreference, SilenceParams};

/// Ceiling on `/predict` bodies.
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub model_root: PathBuf,
    pub device: DevicePreference,
    pub trim_silence: bool,
    pub scratch_dir: PathBuf,
    pub request_timeout_secs: u64,
    pub cors_allowed_origins: Option<Vec<String>>,
    pub silence: SilenceParams,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            model_root: PathBuf::from("galsenai-xtts-wo-checkpoints"),
            device: DevicePreference::Auto,
            trim_silence: true,
            scratch_dir: std::env::temp_dir(),
            request_timeout_secs: 300,
            cors_allowed_origins: None,
            silence: SilenceParams::default(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        // Vertex AI sets AIP_HTTP_PORT; PORT is the generic fallback
        let port = env_parse("AIP_HTTP_PORT")
            .or_else(|| env_parse("PORT"))
            .unwrap_or(defaults.port);

        let model_root = std::env::var("MODEL_ROOT")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.model_root);

        let device = std::env::var("TTS_DEVICE")
            .map(|v| DevicePreference::parse(&v))
            .unwrap_or(defaults.device);

        let trim_silence = std::env::var("TRIM_SILENCE")
            .ok()
            .and_then(|v| parse_bool(&v))
            .unwrap_or(defaults.trim_silence);

        let scratch_dir = std::env::var("TTS_SCRATCH_DIR")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.scratch_dir);

        let request_timeout_secs = env_parse("REQUEST_TIMEOUT_SECS")
            .filter(|&secs: &u64| secs > 0)
            .unwrap_or(defaults.request_timeout_secs);

        let cors_allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
            .ok()
            .map(|origins| {
                origins
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            });

        let silence = SilenceParams {
            threshold_dbfs: env_parse("SILENCE_THRESHOLD_DBFS")
                .filter(|v: &f32| v.is_finite())
                .unwrap_or(defaults.silence.threshold_dbfs),
            min_silence_ms: env_parse("MIN_SILENCE_MS").unwrap_or(defaults.silence.min_silence_ms),
            keep_silence_ms: env_parse("KEEP_SILENCE_MS").unwrap_or(defaults.silence.keep_silence_ms),
            ..defaults.silence
        };

        Self {
            port,
            model_root,
            device,
            trim_silence,
            scratch_dir,
            request_timeout_secs,
            cors_allowed_origins,
            silence,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.request_timeout(), Duration::from_secs(300));
        assert!(config.trim_silence);
        assert_eq!(config.model_root, PathBuf::from("galsenai-xtts-wo-checkpoints"));
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" off "), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
