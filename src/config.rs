//! Server configuration loaded from the environment.
//!
//! # Environment Variables
//!
//! - `HOST`: Server host address (default: `0.0.0.0`)
//! - `PORT`: Server port (default: `3000`)
//! - `CORS_ALLOWED_ORIGINS`: comma-separated origins, `*` for any (default: `http://localhost:3001`)
//! - `LOG_FORMAT`: `pretty` (default) | `json`
//! - `AUTH_MODE`: `static` (default) | `header`
//! - `AUTH_USER_ID` / `AUTH_WORKSPACE_ID`: identity for `static` mode (default: `u999` / `w1`)
//! - `NOTIFICATION_QUEUE_CAPACITY`: bounded event queue size (default: `1024`)
//!
//! Storage settings are read separately by
//! [`RepositoryConfig`](crate::infrastructure::RepositoryConfig).

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use crate::api::{Authenticator, HeaderAuthenticator, StaticAuthenticator};
use crate::domain::{UserId, WorkspaceId};
use crate::infrastructure::ConfigurationError;
use crate::infrastructure::notification::DEFAULT_QUEUE_CAPACITY;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3001";
pub const DEFAULT_USER_ID: &str = "u999";
pub const DEFAULT_WORKSPACE_ID: &str = "w1";

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigurationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "pretty" | "text" | "plain" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(ConfigurationError::InvalidValue {
                name: "LOG_FORMAT",
                value: value.to_string(),
            }),
        }
    }
}

/// How the caller identity is established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    /// Fixed identity from `AUTH_USER_ID` / `AUTH_WORKSPACE_ID`.
    #[default]
    Static,
    /// Identity from `X-User-Id` / `X-Workspace-Id` request headers.
    Header,
}

impl FromStr for AuthMode {
    type Err = ConfigurationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "static" | "fixed" => Ok(Self::Static),
            "header" | "headers" => Ok(Self::Header),
            _ => Err(ConfigurationError::InvalidValue {
                name: "AUTH_MODE",
                value: value.to_string(),
            }),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins; a lone `*` allows any origin.
    pub cors_allowed_origins: Vec<String>,
    pub log_format: LogFormat,
    pub auth_mode: AuthMode,
    pub auth_user_id: String,
    pub auth_workspace_id: String,
    pub notification_queue_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            cors_allowed_origins: vec![DEFAULT_CORS_ORIGIN.to_string()],
            log_format: LogFormat::default(),
            auth_mode: AuthMode::default(),
            auth_user_id: DEFAULT_USER_ID.to_string(),
            auth_workspace_id: DEFAULT_WORKSPACE_ID.to_string(),
            notification_queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl ServerConfig {
    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::InvalidValue` if a variable cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Reads the configuration through `lookup`, treating blank values as unset.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::InvalidValue` if a variable cannot be parsed.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigurationError> {
        let get = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();

        let port = match get("PORT") {
            Some(value) => value.parse().map_err(|_| ConfigurationError::InvalidValue {
                name: "PORT",
                value,
            })?,
            None => defaults.port,
        };

        let notification_queue_capacity = match get("NOTIFICATION_QUEUE_CAPACITY") {
            Some(value) => value
                .parse::<usize>()
                .ok()
                .filter(|capacity| *capacity > 0)
                .ok_or(ConfigurationError::InvalidValue {
                    name: "NOTIFICATION_QUEUE_CAPACITY",
                    value,
                })?,
            None => defaults.notification_queue_capacity,
        };

        let cors_allowed_origins = get("CORS_ALLOWED_ORIGINS").map_or(
            defaults.cors_allowed_origins,
            |value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(str::to_string)
                    .collect()
            },
        );

        Ok(Self {
            host: get("HOST").unwrap_or(defaults.host),
            port,
            cors_allowed_origins,
            log_format: get("LOG_FORMAT")
                .map(|value| value.parse())
                .transpose()?
                .unwrap_or_default(),
            auth_mode: get("AUTH_MODE")
                .map(|value| value.parse())
                .transpose()?
                .unwrap_or_default(),
            auth_user_id: get("AUTH_USER_ID").unwrap_or(defaults.auth_user_id),
            auth_workspace_id: get("AUTH_WORKSPACE_ID").unwrap_or(defaults.auth_workspace_id),
            notification_queue_capacity,
        })
    }

    /// Socket address to bind.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::InvalidValue` if `HOST` is not an IP address.
    pub fn socket_address(&self) -> Result<SocketAddr, ConfigurationError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| ConfigurationError::InvalidValue {
                name: "HOST",
                value: self.host.clone(),
            })
    }

    /// Builds the authenticator selected by `auth_mode`.
    #[must_use]
    pub fn authenticator(&self) -> Arc<dyn Authenticator> {
        match self.auth_mode {
            AuthMode::Static => Arc::new(StaticAuthenticator::new(
                UserId::new(self.auth_user_id.clone()),
                WorkspaceId::new(self.auth_workspace_id.clone()),
            )),
            AuthMode::Header => Arc::new(HeaderAuthenticator),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use axum::http::HeaderMap;
    use rstest::rstest;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[rstest]
    fn test_defaults_when_unset() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.port, 3000);
        assert_eq!(config.cors_allowed_origins, vec!["http://localhost:3001"]);
    }

    #[rstest]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "8080"),
            ("CORS_ALLOWED_ORIGINS", "http://a.test, http://b.test,"),
            ("LOG_FORMAT", "json"),
            ("AUTH_MODE", "header"),
            ("NOTIFICATION_QUEUE_CAPACITY", "16"),
        ]))
        .unwrap();

        assert_eq!(
            config.socket_address().unwrap(),
            "127.0.0.1:8080".parse().unwrap()
        );
        assert_eq!(
            config.cors_allowed_origins,
            vec!["http://a.test", "http://b.test"]
        );
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.auth_mode, AuthMode::Header);
        assert_eq!(config.notification_queue_capacity, 16);
    }

    #[rstest]
    fn test_blank_values_fall_back_to_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[("PORT", "  "), ("HOST", "")])).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.host, DEFAULT_HOST);
    }

    #[rstest]
    #[case("PORT", "http")]
    #[case("PORT", "70000")]
    #[case("LOG_FORMAT", "xml")]
    #[case("AUTH_MODE", "oauth")]
    #[case("NOTIFICATION_QUEUE_CAPACITY", "0")]
    fn test_invalid_values(#[case] name: &'static str, #[case] value: &str) {
        let error = ServerConfig::from_lookup(lookup(&[(name, value)])).unwrap_err();
        assert_eq!(
            error,
            ConfigurationError::InvalidValue {
                name,
                value: value.to_string()
            }
        );
    }

    #[rstest]
    fn test_static_authenticator_uses_configured_identity() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("AUTH_USER_ID", "alice"),
            ("AUTH_WORKSPACE_ID", "w9"),
        ]))
        .unwrap();

        let identity = config.authenticator().authenticate(&HeaderMap::new()).unwrap();
        assert_eq!(identity.user_id, UserId::new("alice"));
        assert_eq!(identity.workspace_id, WorkspaceId::new("w9"));
    }

    #[rstest]
    fn test_header_authenticator_requires_headers() {
        let config = ServerConfig {
            auth_mode: AuthMode::Header,
            ..ServerConfig::default()
        };
        assert!(config.authenticator().authenticate(&HeaderMap::new()).is_err());
    }
}
