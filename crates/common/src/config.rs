//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{FramezoomError, FramezoomResult};

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory under which per-job scratch directories are created.
    pub scratch_dir: PathBuf,

    /// Frame transform settings.
    pub transform: TransformSettings,

    /// Encoder pass settings.
    pub encoder: EncoderSettings,

    /// Scratch cleanup retry policy.
    pub cleanup: CleanupSettings,

    /// HTTP endpoint settings.
    pub server: ServerSettings,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Which geometric zoom is applied to active frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransformStrategy {
    /// Scale about the keyframe center.
    Affine,
    /// Crop around the frame center and rescale; ignores the keyframe center.
    CenterCrop,
}

impl TransformStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            TransformStrategy::Affine => "affine",
            TransformStrategy::CenterCrop => "center-crop",
        }
    }
}

impl std::str::FromStr for TransformStrategy {
    type Err = FramezoomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "affine" => Ok(TransformStrategy::Affine),
            "center-crop" | "center_crop" | "crop" => Ok(TransformStrategy::CenterCrop),
            other => Err(FramezoomError::config(format!(
                "Unknown transform strategy: {other}. Use: affine, center-crop"
            ))),
        }
    }
}

/// How samples that land outside the source frame are filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeFill {
    /// Constant RGBA color (alpha ignored for RGB frames).
    Solid([u8; 4]),
    /// Repeat the nearest edge pixel.
    Replicate,
}

impl Default for EdgeFill {
    fn default() -> Self {
        EdgeFill::Solid([0, 0, 0, 255])
    }
}

/// Frame transform settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformSettings {
    /// Active strategy.
    pub strategy: TransformStrategy,

    /// Out-of-bounds policy for the affine strategy.
    pub edge_fill: EdgeFill,

    /// Zoom factors at or below this value leave the frame untouched.
    pub min_zoom: f64,
}

/// Whether frames are encoded in one pass or via a lossless intermediate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EncodeMode {
    /// Pipe raw frames straight into the target codec.
    Direct,
    /// Write a lossless intermediate, then transcode it.
    TwoStep,
}

impl std::str::FromStr for EncodeMode {
    type Err = FramezoomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" => Ok(EncodeMode::Direct),
            "two-step" | "two_step" | "twostep" => Ok(EncodeMode::TwoStep),
            other => Err(FramezoomError::config(format!(
                "Unknown encode mode: {other}. Use: direct, two-step"
            ))),
        }
    }
}

/// Target codec parameters for the encoder pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderSettings {
    pub mode: EncodeMode,

    /// ffmpeg video encoder name.
    pub video_codec: String,

    /// Constant rate factor (quality).
    pub crf: u32,

    /// Target bitrate passed to `-b:v` ("0" lets CRF drive quality).
    pub video_bitrate: String,

    /// Encoder thread count.
    pub threads: u32,

    /// Output container extension (without dot).
    pub container: String,
}

/// Bounded-retry policy for scratch file removal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupSettings {
    /// Total removal attempts per path.
    pub attempts: u32,

    /// Pause between attempts in milliseconds.
    pub pause_ms: u64,
}

/// HTTP endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Socket address to bind.
    pub bind: String,

    /// Maximum accepted request body size.
    pub max_upload_bytes: usize,

    /// Origins allowed to call the endpoint from a browser. `"*"` allows any.
    pub allowed_origins: Vec<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "framezoom=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scratch_dir: std::env::temp_dir().join("framezoom"),
            transform: TransformSettings::default(),
            encoder: EncoderSettings::default(),
            cleanup: CleanupSettings::default(),
            server: ServerSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for TransformSettings {
    fn default() -> Self {
        Self {
            strategy: TransformStrategy::Affine,
            edge_fill: EdgeFill::default(),
            min_zoom: 1.0,
        }
    }
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            mode: EncodeMode::TwoStep,
            video_codec: "libvpx-vp9".to_string(),
            crf: 30,
            video_bitrate: "0".to_string(),
            threads: 4,
            container: "webm".to_string(),
        }
    }
}

impl Default for CleanupSettings {
    fn default() -> Self {
        Self {
            attempts: 5,
            pause_ms: 100,
        }
    }
}

impl CleanupSettings {
    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5000".to_string(),
            max_upload_bytes: 512 * 1024 * 1024,
            allowed_origins: vec!["*".to_string()],
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults,
    /// then apply environment overrides.
    pub fn load() -> Self {
        let config_path = config_file_path();
        let mut config = Self::default();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(parsed) => config = parsed,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Apply `FRAMEZOOM_*` overrides. Unknown values are logged and ignored.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(raw) = lookup("FRAMEZOOM_STRATEGY") {
            match raw.parse::<TransformStrategy>() {
                Ok(strategy) => self.transform.strategy = strategy,
                Err(e) => tracing::warn!(value = %raw, "Ignoring FRAMEZOOM_STRATEGY: {e}"),
            }
        }
        if let Some(raw) = lookup("FRAMEZOOM_ENCODE_MODE") {
            match raw.parse::<EncodeMode>() {
                Ok(mode) => self.encoder.mode = mode,
                Err(e) => tracing::warn!(value = %raw, "Ignoring FRAMEZOOM_ENCODE_MODE: {e}"),
            }
        }
        if let Some(dir) = lookup("FRAMEZOOM_SCRATCH_DIR").filter(|d| !d.trim().is_empty()) {
            self.scratch_dir = PathBuf::from(dir);
        }
        if let Some(bind) = lookup("FRAMEZOOM_BIND").filter(|b| !b.trim().is_empty()) {
            self.server.bind = bind;
        }
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> FramezoomResult<()> {
        if !self.transform.min_zoom.is_finite() || self.transform.min_zoom <= 0.0 {
            return Err(FramezoomError::config("transform.min_zoom must be positive"));
        }
        if self.cleanup.attempts == 0 {
            return Err(FramezoomError::config("cleanup.attempts must be at least 1"));
        }
        if self.encoder.video_codec.trim().is_empty() {
            return Err(FramezoomError::config("encoder.video_codec must be set"));
        }
        if self.encoder.container.trim().is_empty() {
            return Err(FramezoomError::config("encoder.container must be set"));
        }
        if self.server.allowed_origins.iter().any(|o| o.trim().is_empty()) {
            return Err(FramezoomError::config("server.allowed_origins must not contain blanks"));
        }
        Ok(())
    }
}

/// Standard config file location.
fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("framezoom").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_service_encoder() {
        let config = AppConfig::default();
        assert_eq!(config.encoder.video_codec, "libvpx-vp9");
        assert_eq!(config.encoder.crf, 30);
        assert_eq!(config.encoder.threads, 4);
        assert_eq!(config.transform.strategy, TransformStrategy::Affine);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"transform":{"strategy":"center-crop"}}"#).unwrap();
        assert_eq!(config.transform.strategy, TransformStrategy::CenterCrop);
        assert_eq!(config.transform.min_zoom, 1.0);
        assert_eq!(config.cleanup.attempts, 5);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config.apply_env_overrides(|key| match key {
            "FRAMEZOOM_STRATEGY" => Some("crop".to_string()),
            "FRAMEZOOM_SCRATCH_DIR" => Some("/var/tmp/fz".to_string()),
            "FRAMEZOOM_ENCODE_MODE" => Some("bogus".to_string()),
            _ => None,
        });
        assert_eq!(config.transform.strategy, TransformStrategy::CenterCrop);
        assert_eq!(config.scratch_dir, PathBuf::from("/var/tmp/fz"));
        assert_eq!(config.encoder.mode, EncodeMode::TwoStep);
    }

    #[test]
    fn test_strategy_parse() {
        assert_eq!(
            "Affine".parse::<TransformStrategy>().unwrap(),
            TransformStrategy::Affine
        );
        assert!("warp".parse::<TransformStrategy>().is_err());
    }

    #[test]
    fn test_edge_fill_serde_shape() {
        let json = serde_json::to_string(&EdgeFill::Solid([1, 2, 3, 4])).unwrap();
        assert_eq!(json, r#"{"solid":[1,2,3,4]}"#);
        let fill: EdgeFill = serde_json::from_str(r#""replicate""#).unwrap();
        assert_eq!(fill, EdgeFill::Replicate);
    }

    #[test]
    fn test_server_allows_any_origin_by_default() {
        let config: AppConfig =
            serde_json::from_str(r#"{"server":{"bind":"0.0.0.0:8080"}}"#).unwrap();
        assert_eq!(config.server.allowed_origins, vec!["*".to_string()]);

        let mut config = AppConfig::default();
        config.server.allowed_origins = vec![" ".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = AppConfig::default();
        config.cleanup.attempts = 0;
        assert!(config.validate().is_err());
    }
}
