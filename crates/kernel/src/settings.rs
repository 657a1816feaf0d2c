use std::path::PathBuf;

use anyhow::{anyhow, bail, Context};
use biblioteca_authz::AuthConfig;
use chrono::Duration;
use serde::Deserialize;

const DEFAULT_ENV: &str = "local";
const ENV_VAR_NAME: &str = "BIBLIOTECA_ENV";
const CONFIG_DIR_ENV: &str = "BIBLIOTECA_CONFIG_DIR";
const ENV_PREFIX: &str = "BIBLIOTECA";

/// Signing key used when none is configured. Refused in production.
pub const DEV_SECRET_KEY: &str = "biblioteca-insecure-development-key";

/// Deployment environment the application is running in.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Staging,
    Production,
}

/// Top-level configuration structure loaded from layered sources.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub reports: ReportSettings,
}

impl Settings {
    /// Load configuration by layering `.env`, base file, environment overlay
    /// and `BIBLIOTECA_*` variables (nested keys joined with `__`).
    pub fn load() -> anyhow::Result<Self> {
        // Allow missing `.env` files without failing.
        let _ = dotenvy::dotenv();

        let environment = std::env::var(ENV_VAR_NAME).unwrap_or_else(|_| DEFAULT_ENV.to_string());
        let config_dir = match std::env::var(CONFIG_DIR_ENV) {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => std::env::current_dir()
                .context("unable to resolve current directory")?
                .join("config"),
        };

        let base_path = config_dir.join("base.toml");
        let environment_path = config_dir.join(format!("{}.toml", environment));

        let cfg = config::Config::builder()
            .add_source(config::File::from(base_path).required(false))
            .add_source(config::File::from(environment_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .with_context(|| "failed to build configuration")?;

        let mut settings: Settings = cfg
            .try_deserialize()
            .with_context(|| "failed to deserialize configuration")?;

        settings.environment = match environment.as_str() {
            "local" => Environment::Local,
            "staging" => Environment::Staging,
            "production" => Environment::Production,
            other => {
                return Err(anyhow!(
                    "unsupported environment '{}'; expected local/staging/production",
                    other
                ));
            }
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Reject combinations that must never reach a deployed server
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.environment == Environment::Production && self.auth.secret_key == DEV_SECRET_KEY {
            bail!("auth.secret_key must be set explicitly in production");
        }
        if self.auth.secret_key.is_empty() {
            bail!("auth.secret_key must not be empty");
        }
        if !(4..=31).contains(&self.auth.bcrypt_cost) {
            bail!("auth.bcrypt_cost must be between 4 and 31");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "ServerSettings::default_host")]
    pub host: String,
    #[serde(default = "ServerSettings::default_port")]
    pub port: u16,
    #[serde(default = "ServerSettings::default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl ServerSettings {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        8000
    }

    fn default_request_timeout_ms() -> u64 {
        15000
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            request_timeout_ms: Self::default_request_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "DatabaseSettings::default_url")]
    pub url: String,
    #[serde(default = "DatabaseSettings::default_max_connections")]
    pub max_connections: u32,
}

impl DatabaseSettings {
    fn default_url() -> String {
        "sqlite://biblioteca.db".to_string()
    }

    fn default_max_connections() -> u32 {
        5
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: Self::default_url(),
            max_connections: Self::default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default)]
    pub log_format: LogFormat,
    /// `EnvFilter` directives; `RUST_LOG` takes precedence when set
    #[serde(default = "TelemetrySettings::default_filter")]
    pub filter: String,
}

impl TelemetrySettings {
    fn default_filter() -> String {
        "info,sqlx=warn".to_string()
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            filter: Self::default_filter(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    #[serde(default = "AuthSettings::default_secret_key")]
    pub secret_key: String,
    #[serde(default = "AuthSettings::default_access_minutes")]
    pub access_token_lifetime_minutes: i64,
    #[serde(default = "AuthSettings::default_refresh_days")]
    pub refresh_token_lifetime_days: i64,
    #[serde(default = "AuthSettings::enabled")]
    pub rotate_refresh_tokens: bool,
    #[serde(default = "AuthSettings::enabled")]
    pub blacklist_after_rotation: bool,
    #[serde(default = "AuthSettings::default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

impl AuthSettings {
    fn default_secret_key() -> String {
        DEV_SECRET_KEY.to_string()
    }

    fn default_access_minutes() -> i64 {
        60
    }

    fn default_refresh_days() -> i64 {
        1
    }

    fn enabled() -> bool {
        true
    }

    fn default_bcrypt_cost() -> u32 {
        12
    }

    pub fn to_auth_config(&self) -> AuthConfig {
        AuthConfig {
            secret_key: self.secret_key.clone(),
            access_token_lifetime: Duration::minutes(self.access_token_lifetime_minutes),
            refresh_token_lifetime: Duration::days(self.refresh_token_lifetime_days),
            rotate_refresh_tokens: self.rotate_refresh_tokens,
            blacklist_after_rotation: self.blacklist_after_rotation,
            bcrypt_cost: self.bcrypt_cost,
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            secret_key: Self::default_secret_key(),
            access_token_lifetime_minutes: Self::default_access_minutes(),
            refresh_token_lifetime_days: Self::default_refresh_days(),
            rotate_refresh_tokens: true,
            blacklist_after_rotation: true,
            bcrypt_cost: Self::default_bcrypt_cost(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportSettings {
    #[serde(default = "ReportSettings::default_output_dir")]
    pub output_dir: String,
    /// TrueType fonts tried in order for chart text
    #[serde(default = "ReportSettings::default_font_paths")]
    pub font_paths: Vec<String>,
}

impl ReportSettings {
    fn default_output_dir() -> String {
        "reporte_graficos".to_string()
    }

    fn default_font_paths() -> Vec<String> {
        [
            "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
            "/usr/share/fonts/dejavu/DejaVuSans.ttf",
            "/usr/share/fonts/TTF/DejaVuSans.ttf",
            "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
            "/Library/Fonts/Arial.ttf",
            "C:\\Windows\\Fonts\\arial.ttf",
        ]
        .iter()
        .map(|p| p.to_string())
        .collect()
    }
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            output_dir: Self::default_output_dir(),
            font_paths: Self::default_font_paths(),
        }
    }
}
