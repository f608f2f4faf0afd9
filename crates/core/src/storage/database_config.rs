use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::shared::settings::ConfigError;

pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

/// PostgreSQL connection settings, read from a JSON file.
///
/// Either `url` or the `user`/`dbname` pair must be present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub dbname: Option<String>,
    #[serde(default)]
    pub sslmode: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5432
}

impl DatabaseConfig {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            user: None,
            password: None,
            dbname: None,
            sslmode: None,
            url: Some(url.into()),
        }
    }

    /// Loads the config at `path`. A non-empty `DATABASE_URL` takes
    /// precedence and the file is not read at all.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        Self::load(path, std::env::var(DATABASE_URL_ENV).ok())
    }

    fn load(path: &Path, env_url: Option<String>) -> Result<Self, ConfigError> {
        if let Some(url) = env_url.filter(|u| !u.trim().is_empty()) {
            log::debug!("Using database from {DATABASE_URL_ENV}");
            return Ok(Self::from_url(url));
        }

        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<(), ConfigError> {
        if self.url.is_some() {
            return Ok(());
        }
        let invalid = |reason: &str| ConfigError::Invalid {
            path: PathBuf::from(path),
            reason: reason.to_string(),
        };
        if self.user.as_deref().map_or(true, str::is_empty) {
            return Err(invalid("missing \"user\" (or \"url\")"));
        }
        if self.dbname.as_deref().map_or(true, str::is_empty) {
            return Err(invalid("missing \"dbname\" (or \"url\")"));
        }
        Ok(())
    }

    /// libpq connection string: the `url` verbatim, otherwise
    /// `key='value'` pairs.
    pub fn connection_string(&self) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }
        let mut parts = vec![
            format!("host={}", quote(&self.host)),
            format!("port={}", self.port),
        ];
        let optional = [
            ("user", &self.user),
            ("password", &self.password),
            ("dbname", &self.dbname),
            ("sslmode", &self.sslmode),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                parts.push(format!("{key}={}", quote(value)));
            }
        }
        parts.join(" ")
    }

    /// Connection description safe to log.
    pub fn redacted(&self) -> String {
        match &self.url {
            Some(_) => "database url".to_string(),
            None => format!(
                "{}@{}:{}/{}",
                self.user.as_deref().unwrap_or(""),
                self.host,
                self.port,
                self.dbname.as_deref().unwrap_or("")
            ),
        }
    }
}

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}
