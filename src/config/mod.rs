//! Runtime configuration: deployment classification, bootstrap budgets, and
//! the `config.toml` / env override layering.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::error;

use crate::error::BootstrapError;

const DEFAULT_BACKEND_URL: &str = "https://api.vendaspot.app";
const DEFAULT_HOST: &str = "localhost";

// ─── Deployment classification ───────────────────────────────────────────────

/// Where this client is being served from.
///
/// Remote/managed hosting sees higher and more variable latency than local
/// development, so the class selects the timeout and retry budgets below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentClass {
    Local,
    Remote,
}

impl DeploymentClass {
    /// Classify by serving hostname.
    ///
    /// `localhost`, the IPv4 loopback, and any `.local`-suffixed hostname
    /// count as Local; everything else is a remote deployment. The port
    /// does not affect the decision — it stays in the signature so callers
    /// pass the full serving origin.
    pub fn classify(hostname: &str, _port: &str) -> Self {
        let host = hostname.trim().to_ascii_lowercase();
        if host == "localhost" || host == "127.0.0.1" || host.ends_with(".local") {
            DeploymentClass::Local
        } else {
            DeploymentClass::Remote
        }
    }

    pub fn is_remote(self) -> bool {
        matches!(self, DeploymentClass::Remote)
    }
}

impl std::fmt::Display for DeploymentClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeploymentClass::Local => write!(f, "local"),
            DeploymentClass::Remote => write!(f, "remote"),
        }
    }
}

// ─── Bootstrap budgets ───────────────────────────────────────────────────────

/// Timeout and retry budgets for one bootstrap run.
///
/// The extra retry and the longer budgets on the Remote class trade a few
/// seconds of additional loading time against spurious failures from
/// transient network jitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapProfile {
    pub class: DeploymentClass,
    /// Budget for the session fetch.
    pub session_timeout: Duration,
    /// Budget for the profile row lookup.
    pub profile_lookup_timeout: Duration,
    /// Budget for a whole attempt (session + profile + decision).
    pub total_init_timeout: Duration,
    /// Delay before a scheduled retry re-enters the state machine.
    pub retry_delay: Duration,
    /// Ceiling on the retry counter; reaching it fails the bootstrap.
    pub max_retries: u32,
    /// Delay between a visibility/focus signal and the re-check it schedules.
    pub recheck_delay: Duration,
}

impl BootstrapProfile {
    /// Select budgets for a serving origin.
    pub fn select(hostname: &str, port: &str) -> Self {
        Self::for_class(DeploymentClass::classify(hostname, port))
    }

    pub fn for_class(class: DeploymentClass) -> Self {
        match class {
            DeploymentClass::Local => Self {
                class,
                session_timeout: Duration::from_millis(5000),
                profile_lookup_timeout: Duration::from_millis(5000),
                total_init_timeout: Duration::from_millis(10_000),
                retry_delay: Duration::from_millis(1000),
                max_retries: 1,
                recheck_delay: Duration::from_millis(1000),
            },
            DeploymentClass::Remote => Self {
                class,
                session_timeout: Duration::from_millis(8000),
                profile_lookup_timeout: Duration::from_millis(8000),
                total_init_timeout: Duration::from_millis(15_000),
                retry_delay: Duration::from_millis(2000),
                max_retries: 2,
                recheck_delay: Duration::from_millis(500),
            },
        }
    }

    /// Millisecond-scale budgets for unit tests (no real waiting).
    ///
    /// Keeps the class's retry ceiling so retry-policy tests exercise the
    /// real budgets.
    pub fn instant(class: DeploymentClass) -> Self {
        Self {
            session_timeout: Duration::from_millis(100),
            profile_lookup_timeout: Duration::from_millis(100),
            total_init_timeout: Duration::from_millis(500),
            retry_delay: Duration::from_millis(10),
            recheck_delay: Duration::from_millis(5),
            ..Self::for_class(class)
        }
    }
}

// ─── TOML config file ────────────────────────────────────────────────────────

/// `config.toml` — all fields are optional overrides.
/// Priority: CLI / env var  >  TOML  >  built-in default.
#[derive(Deserialize, Default)]
struct TomlConfig {
    /// Hosted backend base URL (default: https://api.vendaspot.app).
    backend_url: Option<String>,
    /// Project API key for the hosted backend. Required at runtime.
    api_key: Option<String>,
    /// Hostname this client is served from (drives timeout budgets).
    host: Option<String>,
    /// Port this client is served from.
    port: Option<String>,
    /// Log level filter string, e.g. "debug", "info,vouchd=trace" (default: "info").
    log: Option<String>,
    /// Log output format: "pretty" (default, human-readable) | "json" (structured).
    log_format: Option<String>,
}

fn load_toml(path: &Path) -> Option<TomlConfig> {
    let contents = std::fs::read_to_string(path).ok()?;
    match toml::from_str::<TomlConfig>(&contents) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            error!(path = %path.display(), err = %e, "failed to parse config.toml — using defaults");
            None
        }
    }
}

// ─── Resolved configuration ──────────────────────────────────────────────────

/// CLI/env values that take priority over the config file.
#[derive(Debug, Default)]
pub struct CliOverrides {
    pub backend_url: Option<String>,
    pub api_key: Option<String>,
    pub host: Option<String>,
    pub port: Option<String>,
    pub log: Option<String>,
    pub log_format: Option<String>,
}

/// Fully resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct VouchdConfig {
    pub backend_url: String,
    pub api_key: String,
    pub host: String,
    pub port: String,
    pub log_level: String,
    pub log_format: String,
}

impl VouchdConfig {
    /// Resolve configuration with CLI / env > TOML > built-in default.
    pub fn resolve(config_path: Option<&Path>, cli: CliOverrides) -> Self {
        let file = config_path.and_then(load_toml).unwrap_or_default();
        Self {
            backend_url: cli
                .backend_url
                .or(file.backend_url)
                .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string()),
            api_key: cli.api_key.or(file.api_key).unwrap_or_default(),
            host: cli
                .host
                .or(file.host)
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: cli.port.or(file.port).unwrap_or_default(),
            log_level: cli.log.or(file.log).unwrap_or_else(|| "info".to_string()),
            log_format: cli
                .log_format
                .or(file.log_format)
                .unwrap_or_else(|| "pretty".to_string()),
        }
    }

    /// Budgets for the serving origin this config describes.
    pub fn profile(&self) -> BootstrapProfile {
        BootstrapProfile::select(&self.host, &self.port)
    }

    /// Validate the fields a bootstrap cannot run without.
    pub fn validate(&self) -> Result<(), BootstrapError> {
        if self.backend_url.trim().is_empty() {
            return Err(BootstrapError::Configuration(
                "backend URL is not configured — set the VOUCHD_BACKEND_URL environment variable"
                    .to_string(),
            ));
        }
        if self.api_key.trim().is_empty() {
            return Err(BootstrapError::Configuration(
                "api key is not configured — set the VOUCHD_API_KEY environment variable"
                    .to_string(),
            ));
        }
        Ok(())
    }
}
