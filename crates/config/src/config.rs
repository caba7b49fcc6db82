use crate::error::{ErrorKind, Result};
use binscan_backend::{BackendKind, ScannerBackendConfig};
use binscan_session::SessionOptions;
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "BINSCAN_";
const FILE_NAME: &str = "config.toml";

/// Timing for scan sessions, in milliseconds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub feedback_delay_ms: u64,
    pub probe_timeout_ms: u64,
}
impl SessionConfig {
    pub fn options(&self) -> SessionOptions {
        SessionOptions {
            feedback_delay: Duration::from_millis(self.feedback_delay_ms),
            probe_timeout: Duration::from_millis(self.probe_timeout_ms),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        let defaults = SessionOptions::default();
        Self {
            feedback_delay_ms: duration_ms(defaults.feedback_delay),
            probe_timeout_ms: duration_ms(defaults.probe_timeout),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Which backend new sessions start with.
    pub backend: BackendKind,
    pub scanner: ScannerBackendConfig,
    pub session: SessionConfig,
}

impl Config {
    /// Load from the platform config file and the environment.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load as [`load()`](Self::load) does, with `path` layered over the
    /// platform config file. Unlike the platform file, `path` must exist.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let platform = Self::default_path();
        Self::extract(Self::layered(platform.as_deref(), path))
    }

    /// `config.toml` in the platform configuration directory, if the
    /// platform has one.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "binscan", "binscan").map(|dirs| dirs.config_dir().join(FILE_NAME))
    }

    pub fn layered(platform: Option<&Path>, explicit: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(platform) = platform {
            figment = figment.merge(Toml::file(platform));
        }
        if let Some(explicit) = explicit {
            figment = figment.merge(Toml::file_exact(explicit));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn extract(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        tracing::debug!(
            backend = %config.backend,
            formats = %config.scanner.preferred_formats,
            facing = %config.scanner.facing,
            "Configuration loaded"
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.scanner.preferred_formats.is_empty() {
            exn::bail!(ErrorKind::Invalid("scanner.preferred_formats must name at least one symbology"));
        }
        if self.scanner.frame_interval_ms == 0 {
            exn::bail!(ErrorKind::Invalid("scanner.frame_interval_ms must be positive"));
        }
        if self.session.probe_timeout_ms == 0 {
            exn::bail!(ErrorKind::Invalid("session.probe_timeout_ms must be positive"));
        }
        Ok(())
    }

    /// The backend configuration, with the source mode following
    /// [`backend`](Self::backend).
    pub fn backend_config(&self) -> ScannerBackendConfig {
        let source_mode = self.backend.source_mode();
        if self.scanner.source_mode != source_mode {
            tracing::warn!(
                backend = %self.backend,
                configured = %self.scanner.source_mode,
                "scanner.source_mode disagrees with backend; following backend"
            );
        }
        ScannerBackendConfig { source_mode, ..self.scanner.clone() }
    }

    pub fn session_options(&self) -> SessionOptions {
        self.session.options()
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
