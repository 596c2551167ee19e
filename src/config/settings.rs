use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::condition::WaitOptions;
use crate::kernel::deferred::DEFAULT_POLL_INTERVAL;
use crate::util::paths::config_path;

/// Example configuration file contents (bundled with the binary)
pub const EXAMPLE_CONFIG: &str = include_str!("config.toml.example");

/// Application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Blocking wait behaviour
    pub wait: WaitConfig,
    /// Kernel behaviour
    pub kernel: KernelConfig,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaitConfig {
    /// Sleep after an idle event-loop iteration
    pub idle_backoff: Duration,
    /// Timeout used when a magic is given no `--timeout`
    pub default_timeout: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KernelConfig {
    /// Upper bound for one receive on an asynchronous message source
    pub poll_interval: Duration,
    /// Session name stamped on request headers
    pub session: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlWaitConfig {
    pub idle_backoff_ms: Option<u64>,
    pub default_timeout_secs: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlKernelConfig {
    pub poll_interval_ms: Option<u64>,
    pub session: Option<String>,
}

/// TOML representation of the config file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub wait: Option<TomlWaitConfig>,
    pub kernel: Option<TomlKernelConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            wait: WaitConfig {
                idle_backoff: Duration::from_millis(1),
                default_timeout: None,
            },
            kernel: KernelConfig {
                poll_interval: DEFAULT_POLL_INTERVAL,
                session: "cellblock".to_string(),
            },
        }
    }
}

impl WaitConfig {
    pub fn wait_options(&self) -> WaitOptions {
        WaitOptions::default()
            .with_idle_backoff(self.idle_backoff)
            .with_timeout(self.default_timeout)
    }
}

impl Config {
    /// Load configuration from the default location, merging with defaults.
    ///
    /// A missing file is created from the bundled example; an unreadable or
    /// invalid one is reported and ignored.
    pub fn load() -> Self {
        let config_file = config_path();

        // Create example config on first run
        if !config_file.exists() {
            Self::create_default_config(&config_file);
        }

        match Self::load_from(&config_file) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(
                    path = %config_file.display(),
                    error = %e,
                    "Ignoring config file"
                );
                Config::default()
            }
        }
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        let toml_config: TomlConfig = toml::from_str(contents)?;
        let mut config = Config::default();

        if let Some(wait) = toml_config.wait {
            if let Some(ms) = wait.idle_backoff_ms {
                config.wait.idle_backoff = Duration::from_millis(ms);
            }
            if let Some(secs) = wait.default_timeout_secs {
                let timeout = Duration::try_from_secs_f64(secs).with_context(|| {
                    format!("wait.default_timeout_secs must be non-negative, got {secs}")
                })?;
                config.wait.default_timeout = Some(timeout);
            }
        }

        if let Some(kernel) = toml_config.kernel {
            if let Some(ms) = kernel.poll_interval_ms {
                config.kernel.poll_interval = Duration::from_millis(ms);
            }
            if let Some(session) = kernel.session {
                config.kernel.session = session;
            }
        }

        Ok(config)
    }

    /// Create the default config file from the bundled example
    fn create_default_config(path: &Path) {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                if let Err(e) = fs::create_dir_all(parent) {
                    tracing::warn!(error = %e, "Failed to create config directory");
                    return;
                }
            }
        }

        if let Err(e) = fs::write(path, EXAMPLE_CONFIG) {
            tracing::warn!(error = %e, "Failed to write default config");
        }
    }

    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.wait.default_timeout = timeout;
        self
    }
}
