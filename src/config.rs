// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment at startup. A `.env` file in
//! the working directory is read first when present.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Root directory of the document store | `./data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `5000` |
//! | `JWT_SECRET` | HS256 signing secret | Required |
//! | `JWT_EXPIRY_HOURS` | Access token lifetime | `168` |
//! | `PASSWORD_RESET_TTL_MINS` | Reset token lifetime | `60` |
//! | `FRONTEND_URL` | Base URL used in password reset links | `http://localhost:5173` |
//! | `CORS_ORIGINS` | Comma separated allowed origins; empty allows any | empty |
//! | `SEED_ADMIN_EMAIL` | First admin account, created when no users exist | unset |
//! | `SEED_ADMIN_PASSWORD` | Password for the seeded admin | unset |
//! | `SEED_ADMIN_NAME` | Display name for the seeded admin | `Administrator` |
//! | `SEED_DEMO_DATA` | Load a demo school into an empty store (`true`/`false`) | `false` |
//! | `MAX_UPLOAD_BYTES` | Profile image size limit | `5242880` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM files; both set enables HTTPS | unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::path::PathBuf;

use crate::storage::paths::DATA_ROOT;

pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const JWT_SECRET_ENV: &str = "JWT_SECRET";
pub const JWT_EXPIRY_HOURS_ENV: &str = "JWT_EXPIRY_HOURS";
pub const PASSWORD_RESET_TTL_ENV: &str = "PASSWORD_RESET_TTL_MINS";
pub const FRONTEND_URL_ENV: &str = "FRONTEND_URL";
pub const CORS_ORIGINS_ENV: &str = "CORS_ORIGINS";
pub const SEED_ADMIN_EMAIL_ENV: &str = "SEED_ADMIN_EMAIL";
pub const SEED_ADMIN_PASSWORD_ENV: &str = "SEED_ADMIN_PASSWORD";
pub const SEED_ADMIN_NAME_ENV: &str = "SEED_ADMIN_NAME";
pub const SEED_DEMO_DATA_ENV: &str = "SEED_DEMO_DATA";
pub const MAX_UPLOAD_BYTES_ENV: &str = "MAX_UPLOAD_BYTES";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_JWT_EXPIRY_HOURS: i64 = 168;
pub const DEFAULT_RESET_TTL_MINS: i64 = 60;
pub const DEFAULT_FRONTEND_URL: &str = "http://localhost:5173";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedAdmin {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,
    pub password_reset_ttl_mins: i64,
    pub frontend_url: String,
    /// Empty means any origin.
    pub cors_origins: Vec<String>,
    pub seed_admin: Option<SeedAdmin>,
    pub seed_demo: bool,
    pub max_upload_bytes: usize,
    pub tls: Option<TlsPaths>,
    pub log_format: LogFormat,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("data_dir", &self.data_dir)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("jwt_secret", &"<redacted>")
            .field("jwt_expiry_hours", &self.jwt_expiry_hours)
            .field("password_reset_ttl_mins", &self.password_reset_ttl_mins)
            .field("frontend_url", &self.frontend_url)
            .field("cors_origins", &self.cors_origins)
            .field("seed_admin", &self.seed_admin.as_ref().map(|s| &s.email))
            .field("seed_demo", &self.seed_demo)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("tls", &self.tls)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load using `lookup` for each variable. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let jwt_secret = get(JWT_SECRET_ENV).ok_or(ConfigError::Missing(JWT_SECRET_ENV))?;

        let seed_admin = match (get(SEED_ADMIN_EMAIL_ENV), get(SEED_ADMIN_PASSWORD_ENV)) {
            (Some(email), Some(password)) => Some(SeedAdmin {
                email,
                password,
                name: get(SEED_ADMIN_NAME_ENV).unwrap_or_else(|| "Administrator".to_string()),
            }),
            _ => None,
        };

        let tls = match (get(TLS_CERT_PATH_ENV), get(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            _ => None,
        };

        let seed_demo = match get(SEED_DEMO_DATA_ENV).map(|v| v.to_ascii_lowercase()).as_deref() {
            None | Some("false" | "0" | "no") => false,
            Some("true" | "1" | "yes") => true,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: SEED_DEMO_DATA_ENV,
                    value: other.to_string(),
                })
            }
        };

        let log_format = match get(LOG_FORMAT_ENV).as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: LOG_FORMAT_ENV,
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            data_dir: get(DATA_DIR_ENV).unwrap_or_else(|| DATA_ROOT.to_string()).into(),
            host: get(HOST_ENV).unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse(&get, PORT_ENV, DEFAULT_PORT)?,
            jwt_secret,
            jwt_expiry_hours: positive(&get, JWT_EXPIRY_HOURS_ENV, DEFAULT_JWT_EXPIRY_HOURS)?,
            password_reset_ttl_mins: positive(&get, PASSWORD_RESET_TTL_ENV, DEFAULT_RESET_TTL_MINS)?,
            frontend_url: get(FRONTEND_URL_ENV)
                .unwrap_or_else(|| DEFAULT_FRONTEND_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            cors_origins: get(CORS_ORIGINS_ENV)
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            seed_admin,
            seed_demo,
            max_upload_bytes: parse(&get, MAX_UPLOAD_BYTES_ENV, DEFAULT_MAX_UPLOAD_BYTES)?,
            tls,
            log_format,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Link sent to a user for resetting their password.
    pub fn reset_url(&self, token: &str, email: &str) -> String {
        format!(
            "{}/reset-password?token={token}&email={email}",
            self.frontend_url
        )
    }
}

fn parse<T, G>(get: &G, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

fn positive<G>(get: &G, name: &'static str, default: i64) -> Result<i64, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let value = parse(get, name, default)?;
    if value <= 0 {
        return Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
        });
    }
    Ok(value)
}
