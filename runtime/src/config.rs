//! Environment-driven runtime configuration.
//!
//! Every knob has a default and a `PAIRWATCH_*` override. Values are read
//! through a lookup function so callers (and tests) can supply their own
//! source instead of the process environment.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_TARGET_URL: &str = "https://dexscreener.com/solana?rankBy=trendingScoreM5&order=desc&minLiq=10000&minMarketCap=10000&maxMarketCap=250000&min24HVol=50000&profile=1";
pub const DEFAULT_HOME_URL: &str = "https://dexscreener.com";

const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_INTERVAL_MINUTES: u64 = 5;
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_BACKOFF_MS: u64 = 5000;
const DEFAULT_FAILURE_THRESHOLD: u32 = 3;
const DEFAULT_ALERT_RETRIES: u32 = 3;
const DEFAULT_ALERT_BACKOFF_MS: u64 = 500;
const DEFAULT_ALERT_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_NAV_TIMEOUT_MS: u64 = 60_000;
const DEFAULT_SETTLE_MS: u64 = 5000;
const DEFAULT_CHALLENGE_WAIT_MS: u64 = 10_000;

/// Browser session settings for one acquisition.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub home_url: String,
    pub target_url: String,
    pub nav_timeout_ms: u64,
    /// Pause after each navigation.
    pub settle: Duration,
    /// Extra pause when a challenge page is detected.
    pub challenge_wait: Duration,
    pub retry_attempts: u32,
    pub retry_backoff: Duration,
    pub headless: bool,
    pub chromium_path: Option<PathBuf>,
    /// Write page HTML and extracted records next to the snapshot.
    pub debug_artifacts: bool,
}

/// Webhook alert settings.
#[derive(Debug, Clone)]
pub struct AlertConfig {
    pub webhook_url: Option<String>,
    /// Sent verbatim in the `auth` header.
    pub auth: Option<String>,
    /// HMAC-SHA256 signing secret.
    pub secret: Option<String>,
    pub retries: u32,
    pub backoff: Duration,
    pub timeout: Duration,
}

/// Full daemon configuration.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub data_dir: PathBuf,
    pub interval: Duration,
    /// Granularity of the interruptible interval wait.
    pub poll_interval: Duration,
    pub run_once: bool,
    pub failure_threshold: u32,
    pub alert_on_success: bool,
    pub alert_on_success_min_count: usize,
    pub session: SessionConfig,
    pub alert: AlertConfig,
}

impl DaemonConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let env = Env(&lookup);
        Self {
            data_dir: PathBuf::from(
                env.string("PAIRWATCH_DATA_DIR")
                    .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string()),
            ),
            interval: interval_from_minutes(
                env.u64("PAIRWATCH_SCRAPE_INTERVAL_MINUTES", DEFAULT_INTERVAL_MINUTES),
            ),
            poll_interval: Duration::from_secs(1),
            run_once: env.flag("PAIRWATCH_SCRAPE_ONCE", false),
            failure_threshold: env
                .u32("PAIRWATCH_FAILURE_THRESHOLD", DEFAULT_FAILURE_THRESHOLD)
                .max(1),
            alert_on_success: env.flag("PAIRWATCH_ALERT_ON_SUCCESS", false),
            alert_on_success_min_count: env
                .u64("PAIRWATCH_ALERT_ON_SUCCESS_MIN_COUNT", 1)
                .max(1) as usize,
            session: SessionConfig {
                home_url: env
                    .string("PAIRWATCH_HOME_URL")
                    .unwrap_or_else(|| DEFAULT_HOME_URL.to_string()),
                target_url: env
                    .string("PAIRWATCH_TARGET_URL")
                    .unwrap_or_else(|| DEFAULT_TARGET_URL.to_string()),
                nav_timeout_ms: env.u64("PAIRWATCH_NAV_TIMEOUT_MS", DEFAULT_NAV_TIMEOUT_MS),
                settle: Duration::from_millis(env.u64("PAIRWATCH_SETTLE_MS", DEFAULT_SETTLE_MS)),
                challenge_wait: Duration::from_millis(
                    env.u64("PAIRWATCH_CHALLENGE_WAIT_MS", DEFAULT_CHALLENGE_WAIT_MS),
                ),
                retry_attempts: env
                    .u32("PAIRWATCH_RETRY_ATTEMPTS", DEFAULT_RETRY_ATTEMPTS)
                    .max(1),
                retry_backoff: Duration::from_millis(
                    env.u64("PAIRWATCH_RETRY_BACKOFF_MS", DEFAULT_RETRY_BACKOFF_MS),
                ),
                headless: env.flag("PAIRWATCH_HEADLESS", true),
                chromium_path: env.string("PAIRWATCH_CHROMIUM_PATH").map(PathBuf::from),
                debug_artifacts: env.flag("PAIRWATCH_DEBUG_ARTIFACTS", false),
            },
            alert: AlertConfig {
                webhook_url: env.string("PAIRWATCH_ALERT_WEBHOOK_URL"),
                auth: env.string("PAIRWATCH_ALERT_WEBHOOK_AUTH"),
                secret: env.string("PAIRWATCH_ALERT_WEBHOOK_SECRET"),
                retries: env
                    .u32("PAIRWATCH_ALERT_RETRIES", DEFAULT_ALERT_RETRIES)
                    .max(1),
                backoff: Duration::from_millis(
                    env.u64("PAIRWATCH_ALERT_BACKOFF_MS", DEFAULT_ALERT_BACKOFF_MS),
                ),
                timeout: Duration::from_millis(
                    env.u64("PAIRWATCH_ALERT_TIMEOUT_MS", DEFAULT_ALERT_TIMEOUT_MS),
                ),
            },
        }
    }
}

/// Tick interval for `minutes`, at least one minute.
pub fn interval_from_minutes(minutes: u64) -> Duration {
    Duration::from_secs(minutes.max(1).saturating_mul(60))
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

struct Env<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    /// Trimmed value; empty counts as unset.
    fn string(&self, name: &str) -> Option<String> {
        (self.0)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn u64(&self, name: &str, default_value: u64) -> u64 {
        self.string(name)
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(default_value)
    }

    fn u32(&self, name: &str, default_value: u32) -> u32 {
        self.string(name)
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(default_value)
    }

    fn flag(&self, name: &str, default_value: bool) -> bool {
        match self.string(name).map(|v| v.to_ascii_lowercase()).as_deref() {
            Some("1" | "true" | "yes" | "on") => true,
            Some("0" | "false" | "no" | "off") => false,
            _ => default_value,
        }
    }
}
