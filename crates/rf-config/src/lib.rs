//! # rf-config
//!
//! Layered settings for Rusty-Forum: built-in defaults, then an optional
//! `config/rusty-forum.{toml,yaml,json}` file, then `RUSTY_FORUM__*`
//! environment variables (a `.env` file is loaded first if present).
//!
//! `RUSTY_FORUM__POSTS__TRACK_IP_PER_POST=true` maps to `posts.track_ip_per_post`.

use std::path::PathBuf;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use rf_core::traits::SiteConfig;
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use thiserror::Error;

pub const ENV_PREFIX: &str = "RUSTY_FORUM";
const DEFAULT_FILE: &str = "config/rusty-forum";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("failed to read .env: {0}")]
    DotEnv(#[from] dotenvy::Error),
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub posts: PostSettings,
    pub log: LogSettings,
    /// The `.env` file that was applied, if any. Set by [`Settings::load`].
    #[serde(skip)]
    pub env_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct DatabaseSettings {
    /// e.g. `sqlite://rusty_forum.db`; may carry credentials for other backends.
    #[serde(deserialize_with = "secret")]
    pub url: SecretString,
}

/// Post-related switches, consulted on every post creation.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PostSettings {
    #[serde(default)]
    pub track_ip_per_post: bool,
}

impl SiteConfig for PostSettings {
    fn track_ip_per_post(&self) -> bool {
        self.track_ip_per_post
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    /// An `EnvFilter` directive, used when `RUST_LOG` is unset.
    pub filter: String,
    #[serde(default)]
    pub json: bool,
}

/// A missing `.env` is fine; one that exists but cannot be read or parsed is not.
fn applied_env_file(outcome: Result<PathBuf, dotenvy::Error>) -> Result<Option<PathBuf>, ConfigError> {
    match outcome {
        Ok(path) => Ok(Some(path)),
        Err(error) if error.not_found() => Ok(None),
        Err(error) => Err(error.into()),
    }
}

fn secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

impl Settings {
    /// Loads `.env`, the default config file (if any), and `RUSTY_FORUM__*` variables.
    ///
    /// Runs before logging is set up, so nothing is logged here; the applied
    /// `.env` path is reported through [`Settings::env_file`] instead.
    pub fn load() -> Result<Self, ConfigError> {
        let env_file = applied_env_file(dotenvy::dotenv())?;
        let mut settings = Self::load_from(DEFAULT_FILE, ENV_PREFIX)?;
        settings.env_file = env_file;
        Ok(settings)
    }

    /// Like [`Settings::load`] with an explicit file stem and env prefix, skipping `.env`.
    pub fn load_from(file: &str, env_prefix: &str) -> Result<Self, ConfigError> {
        let config = Self::defaults()?
            .add_source(File::with_name(file).required(false))
            .add_source(
                Environment::with_prefix(env_prefix)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Parses TOML on top of the defaults; handy for tests and embedding.
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        let config = Self::defaults()?
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Ok(Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("database.url", "sqlite://rusty_forum.db")?
            .set_default("posts.track_ip_per_post", false)?
            .set_default("log.filter", "info")?
            .set_default("log.json", false)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_defaults_apply_without_sources() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.database.url.expose_secret(), "sqlite://rusty_forum.db");
        assert!(!settings.posts.track_ip_per_post());
        assert_eq!(settings.log.filter, "info");
        assert!(!settings.log.json);
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let settings = Settings::from_toml(
            r#"
            [server]
            port = 9090

            [database]
            url = "sqlite::memory:"

            [posts]
            track_ip_per_post = true
            "#,
        )
        .unwrap();

        assert_eq!(settings.server.port, 9090);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.database.url.expose_secret(), "sqlite::memory:");
        assert!(settings.posts.track_ip_per_post());
    }

    #[test]
    fn test_environment_overrides_defaults() {
        // A prefix no other test uses, since the environment is process-wide.
        std::env::set_var("RF_CONFIG_TEST__POSTS__TRACK_IP_PER_POST", "true");
        std::env::set_var("RF_CONFIG_TEST__SERVER__PORT", "7070");

        let settings = Settings::load_from("does/not/exist", "RF_CONFIG_TEST").unwrap();
        assert!(settings.posts.track_ip_per_post);
        assert_eq!(settings.server.port, 7070);
    }

    #[test]
    fn test_env_file_outcomes() {
        let found = applied_env_file(Ok(PathBuf::from("/srv/forum/.env"))).unwrap();
        assert_eq!(found, Some(PathBuf::from("/srv/forum/.env")));

        let missing = dotenvy::Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "no .env"));
        assert_eq!(applied_env_file(Err(missing)).unwrap(), None);

        let malformed = dotenvy::Error::LineParse("RUSTY FORUM=1".into(), 6);
        assert!(matches!(applied_env_file(Err(malformed)), Err(ConfigError::DotEnv(_))));
    }

    #[test]
    fn test_secret_is_redacted_in_debug_output() {
        let settings = Settings::from_toml("[database]\nurl = \"postgres://user:hunter2@db\"").unwrap();
        assert!(!format!("{settings:?}").contains("hunter2"));
    }
}
