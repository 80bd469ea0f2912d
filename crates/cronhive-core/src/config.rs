use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 0; // 0 = let the OS pick, address is logged on start
pub const DEFAULT_BASE_PATH: &str = "/zima_cron";
pub const DEFAULT_SHELL: &str = "/bin/sh";
pub const DEFAULT_EXEC_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_MAX_MESSAGE_CHARS: usize = 4000;
pub const ENV_PREFIX: &str = "CRONHIVE_";

/// Top-level config (cronhive.toml + CRONHIVE_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CronhiveConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// HTTP listener settings for the gateway binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default)]
    pub port: u16,
    /// Prefix under which the task routes are mounted.
    #[serde(default = "default_base_path")]
    pub base_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: DEFAULT_PORT,
            base_path: default_base_path(),
        }
    }
}

/// How task commands are spawned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Shell binary the command string is handed to.
    #[serde(default = "default_shell")]
    pub shell: String,
    /// Run the shell as a login shell (`-lc`) so profile PATH entries apply.
    #[serde(default = "bool_true")]
    pub login_shell: bool,
    /// Hard limit per run. The child is killed once it is exceeded.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Captured output longer than this is cut and suffixed with `...`.
    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            shell: default_shell(),
            login_shell: true,
            timeout_secs: DEFAULT_EXEC_TIMEOUT_SECS,
            max_message_chars: DEFAULT_MAX_MESSAGE_CHARS,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Keep only this many log entries per task. `None` keeps everything.
    #[serde(default)]
    pub max_log_entries: Option<usize>,
}

fn bool_true() -> bool {
    true
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_base_path() -> String {
    DEFAULT_BASE_PATH.to_string()
}
fn default_shell() -> String {
    DEFAULT_SHELL.to_string()
}
fn default_timeout_secs() -> u64 {
    DEFAULT_EXEC_TIMEOUT_SECS
}
fn default_max_message_chars() -> usize {
    DEFAULT_MAX_MESSAGE_CHARS
}

impl CronhiveConfig {
    /// Load config from a TOML file with CRONHIVE_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.cronhive/cronhive.toml
    ///
    /// A missing file is not an error; built-in defaults fill every key.
    /// Nested keys are addressed with a double underscore, e.g.
    /// `CRONHIVE_EXECUTOR__TIMEOUT_SECS=30`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);
        debug!(%path, "loading config");

        Self::from_figment(
            Figment::from(Serialized::defaults(CronhiveConfig::default()))
                .merge(Toml::file(&path))
                .merge(Env::prefixed(ENV_PREFIX).split("__")),
        )
    }

    /// Extract a config from an already assembled figment.
    pub fn from_figment(figment: Figment) -> crate::error::Result<Self> {
        figment
            .extract()
            .map_err(|e| crate::error::CronhiveError::Config(e.to_string()))
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.cronhive/cronhive.toml", home)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_toml(toml: &str) -> CronhiveConfig {
        CronhiveConfig::from_figment(
            Figment::from(Serialized::defaults(CronhiveConfig::default()))
                .merge(Toml::string(toml)),
        )
        .unwrap()
    }

    #[test]
    fn defaults_match_documented_values() {
        let cfg = CronhiveConfig::default();
        assert_eq!(cfg.server.bind, "127.0.0.1");
        assert_eq!(cfg.server.port, 0);
        assert_eq!(cfg.server.base_path, "/zima_cron");
        assert_eq!(cfg.executor.shell, "/bin/sh");
        assert!(cfg.executor.login_shell);
        assert_eq!(cfg.executor.timeout_secs, 120);
        assert_eq!(cfg.executor.max_message_chars, 4000);
        assert!(cfg.scheduler.max_log_entries.is_none());
    }

    #[test]
    fn toml_overrides_only_the_keys_it_sets() {
        let cfg = with_toml(
            r#"
            [executor]
            timeout_secs = 5

            [scheduler]
            max_log_entries = 50
            "#,
        );
        assert_eq!(cfg.executor.timeout_secs, 5);
        assert_eq!(cfg.executor.max_message_chars, 4000);
        assert_eq!(cfg.scheduler.max_log_entries, Some(50));
        assert_eq!(cfg.server.base_path, "/zima_cron");
    }

    #[test]
    fn wrong_type_is_a_config_error() {
        let err = CronhiveConfig::from_figment(
            Figment::from(Serialized::defaults(CronhiveConfig::default()))
                .merge(Toml::string("[server]\nport = \"eighty\"")),
        )
        .unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = CronhiveConfig::load(Some("/nonexistent/cronhive.toml")).unwrap();
        assert_eq!(cfg.executor.shell, "/bin/sh");
    }
}
