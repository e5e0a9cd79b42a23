//! Runtime configuration.
//!
//! Read once at startup from the process environment (after loading an
//! optional `.env` file). Every knob has a default, so a bare `region-cast`
//! invocation serves the full 1920x1080 screen on port 5000.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_SCREEN_WIDTH: u32 = 1920;
pub const DEFAULT_SCREEN_HEIGHT: u32 = 1080;
/// ~30 samples per second.
pub const DEFAULT_CAPTURE_INTERVAL: Duration = Duration::from_millis(33);
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Which capture backend the process should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendChoice {
    /// Probe the host once at startup.
    #[default]
    Auto,
    /// Always use the xcap display backend.
    Xcap,
    /// Never capture; every grab fails with `CaptureUnavailable`.
    None,
}

impl FromStr for BackendChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "" => Ok(Self::Auto),
            "xcap" | "display" => Ok(Self::Xcap),
            "none" | "headless" | "off" => Ok(Self::None),
            other => Err(format!("unknown capture backend '{}'", other)),
        }
    }
}

/// Knobs for the capture engine. Independent of the HTTP layer so the
/// controller can be built in tests without touching the environment.
#[derive(Debug, Clone)]
pub struct CaptureSettings {
    /// Full-screen bounds used for request defaults and region normalization.
    pub screen_width: u32,
    pub screen_height: u32,
    /// Fixed delay between producer cycles and between stream parts.
    pub interval: Duration,
    /// Upper bound on how long `stop()` waits for the producer to exit.
    pub stop_timeout: Duration,
    pub jpeg_quality: u8,
    pub backend: BackendChoice,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            screen_width: DEFAULT_SCREEN_WIDTH,
            screen_height: DEFAULT_SCREEN_HEIGHT,
            interval: DEFAULT_CAPTURE_INTERVAL,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            backend: BackendChoice::Auto,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub capture: CaptureSettings,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid BIND_ADDRESS '{value}': {reason}")]
    InvalidBindAddress { value: String, reason: String },
}

impl Config {
    /// Load `.env` (if present) and read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                log::warn!("Ignoring unreadable .env file: {}", e);
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = CaptureSettings::default();

        let port = parse_or(&lookup, "PORT", DEFAULT_PORT);
        let bind_address = match lookup("BIND_ADDRESS") {
            Some(value) => value
                .parse()
                .map_err(|e: std::net::AddrParseError| ConfigError::InvalidBindAddress {
                    value: value.clone(),
                    reason: e.to_string(),
                })?,
            None => SocketAddr::from(([0, 0, 0, 0], port)),
        };

        let capture = CaptureSettings {
            screen_width: parse_or(&lookup, "SCREEN_WIDTH", defaults.screen_width),
            screen_height: parse_or(&lookup, "SCREEN_HEIGHT", defaults.screen_height),
            interval: Duration::from_millis(parse_or(
                &lookup,
                "CAPTURE_INTERVAL_MS",
                defaults.interval.as_millis() as u64,
            )),
            stop_timeout: Duration::from_millis(parse_or(
                &lookup,
                "STOP_TIMEOUT_MS",
                defaults.stop_timeout.as_millis() as u64,
            )),
            jpeg_quality: parse_quality(&lookup, defaults.jpeg_quality),
            backend: parse_or(&lookup, "CAPTURE_BACKEND", defaults.backend),
        };

        Ok(Self {
            bind_address,
            capture,
        })
    }
}

/// Out-of-range values are clamped to 1..=100 rather than rejected.
fn parse_quality<F>(lookup: &F, default: u8) -> u8
where
    F: Fn(&str) -> Option<String>,
{
    let quality = parse_or(lookup, "JPEG_QUALITY", i64::from(default)).clamp(1, 100);
    u8::try_from(quality).unwrap_or(default)
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(e) => {
                log::warn!("Ignoring {}='{}' ({}), using default", key, raw, e);
                default
            }
        },
        None => default,
    }
}
