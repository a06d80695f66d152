use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::auth::AuthConfig;
use crate::repositories::UploadLimits;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_DOCUMENT_BACKEND: &str = "memory";
const DEFAULT_BLOB_BACKEND: &str = "memory";
const DEV_DEFAULT_JWT_SECRET: &str =
    "this_is_a_development_secret_key_that_is_at_least_64_characters_long_for_testing";

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// JWT secret key (minimum 64 characters)
    #[validate(length(min = 64), custom = "validate_jwt_secret")]
    pub jwt_secret: String,

    /// JWT expiration time in seconds (5min - 24h)
    #[validate(range(min = 300, max = 86400))]
    pub jwt_expiration: u64,

    /// JWT issuer name
    #[serde(default = "default_auth_issuer")]
    pub auth_issuer: String,

    /// JWT audience
    #[serde(default = "default_auth_audience")]
    pub auth_audience: String,

    /// Document store backend: "memory" or "sql"
    #[serde(default = "default_document_backend")]
    #[validate(custom = "validate_document_backend")]
    pub document_backend: String,

    /// Database connection URL, used by the "sql" document backend
    pub database_url: String,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// Blob store backend: "memory" or "local"
    #[serde(default = "default_blob_backend")]
    #[validate(custom = "validate_blob_backend")]
    pub blob_backend: String,

    /// Root directory of the "local" blob backend
    #[serde(default = "default_blob_root")]
    pub blob_root: String,

    /// Externally visible base URL; image URLs are built under `{public_base_url}/files`
    #[serde(default)]
    pub public_base_url: Option<String>,

    /// Maximum request body size in bytes (default 32MB)
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,

    /// Maximum size of one product image in bytes
    #[serde(default = "default_max_image_bytes")]
    #[validate(range(min = 1))]
    pub max_image_bytes: usize,

    /// Maximum number of images one product can carry
    #[serde(default = "default_max_images_per_product")]
    #[validate(range(min = 1, max = 50))]
    pub max_images_per_product: usize,

    /// CORS: comma-separated list of allowed origins (production)
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Allow permissive CORS fallback
    #[serde(default)]
    pub cors_allow_any_origin: bool,
}

impl AppConfig {
    /// Creates a new configuration with defaults for everything optional
    pub fn new(jwt_secret: String, host: String, port: u16, environment: String) -> Self {
        Self {
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            jwt_secret,
            jwt_expiration: 3600,
            auth_issuer: default_auth_issuer(),
            auth_audience: default_auth_audience(),
            document_backend: default_document_backend(),
            database_url: "sqlite://marketplace.db?mode=rwc".to_string(),
            db_max_connections: default_db_max_connections(),
            blob_backend: default_blob_backend(),
            blob_root: default_blob_root(),
            public_base_url: None,
            max_body_size: default_max_body_size(),
            max_image_bytes: default_max_image_bytes(),
            max_images_per_product: default_max_images_per_product(),
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
        }
    }

    /// Checks if running in production environment
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Checks if running in development environment
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Returns true if explicit CORS origins are configured
    pub fn has_cors_allowed_origins(&self) -> bool {
        self.cors_allowed_origins
            .as_ref()
            .map(|raw| raw.split(',').any(|origin| !origin.trim().is_empty()))
            .unwrap_or(false)
    }

    /// Whether we should fall back to permissive CORS
    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }

    pub fn uses_sql_documents(&self) -> bool {
        self.document_backend.eq_ignore_ascii_case("sql")
    }

    pub fn uses_local_blobs(&self) -> bool {
        self.blob_backend.eq_ignore_ascii_case("local")
    }

    /// Base URL blob download URLs are built under
    pub fn files_base_url(&self) -> String {
        let base = self
            .public_base_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", self.host, self.port));
        format!("{}/files", base.trim_end_matches('/'))
    }

    pub fn auth_config(&self) -> AuthConfig {
        AuthConfig::new(
            self.jwt_secret.clone(),
            self.auth_audience.clone(),
            self.auth_issuer.clone(),
            Duration::from_secs(self.jwt_expiration),
        )
    }

    pub fn upload_limits(&self) -> UploadLimits {
        UploadLimits {
            max_image_bytes: self.max_image_bytes,
            max_images_per_product: self.max_images_per_product,
        }
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if !self.should_allow_permissive_cors() && !self.has_cors_allowed_origins() {
            let mut err = ValidationError::new("cors_allowed_origins_required");
            err.message = Some(
                "Set APP__CORS_ALLOWED_ORIGINS for non-development environments or explicitly opt-in via APP__CORS_ALLOW_ANY_ORIGIN=true".into(),
            );
            errors.add("cors_allowed_origins", err);
        }

        if !self.is_development() && self.jwt_secret.trim() == DEV_DEFAULT_JWT_SECRET {
            let mut err = ValidationError::new("jwt_secret_default_dev");
            err.message = Some(
                "The bundled development JWT secret must not be used outside development. Set APP__JWT_SECRET to a unique, secure value."
                    .into(),
            );
            errors.add("jwt_secret", err);
        }

        if self.max_image_bytes > self.max_body_size {
            let mut err = ValidationError::new("max_image_bytes");
            err.message = Some("max_image_bytes cannot exceed max_body_size".into());
            errors.add("max_image_bytes", err);
        }

        if self.uses_local_blobs() && self.blob_root.trim().is_empty() {
            let mut err = ValidationError::new("blob_root_required");
            err.message = Some("Set APP__BLOB_ROOT when blob_backend is \"local\"".into());
            errors.add("blob_root", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Default value functions
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_db_max_connections() -> u32 {
    16
}

fn default_document_backend() -> String {
    DEFAULT_DOCUMENT_BACKEND.to_string()
}

fn default_blob_backend() -> String {
    DEFAULT_BLOB_BACKEND.to_string()
}

fn default_blob_root() -> String {
    "data/blobs".to_string()
}

fn default_max_body_size() -> usize {
    32 * 1024 * 1024 // 32MB, room for several base64 images
}

fn default_max_image_bytes() -> usize {
    5 * 1024 * 1024
}

fn default_max_images_per_product() -> usize {
    10
}

fn default_auth_issuer() -> String {
    "marketplace-api".to_string()
}

fn default_auth_audience() -> String {
    "marketplace-clients".to_string()
}

fn validate_document_backend(value: &str) -> Result<(), ValidationError> {
    match value.to_ascii_lowercase().as_str() {
        "memory" | "sql" => Ok(()),
        _ => {
            let mut err = ValidationError::new("document_backend");
            err.message = Some("Must be one of: memory, sql".into());
            Err(err)
        }
    }
}

fn validate_blob_backend(value: &str) -> Result<(), ValidationError> {
    match value.to_ascii_lowercase().as_str() {
        "memory" | "local" => Ok(()),
        _ => {
            let mut err = ValidationError::new("blob_backend");
            err.message = Some("Must be one of: memory, local".into());
            Err(err)
        }
    }
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

fn validate_jwt_secret(secret: &str) -> Result<(), ValidationError> {
    let trimmed = secret.trim();

    if trimmed.len() < 64 {
        let mut err = ValidationError::new("jwt_secret");
        err.message =
            Some("JWT secret must be at least 64 characters for adequate security".into());
        return Err(err);
    }

    if let Some(first) = trimmed.chars().next() {
        if trimmed.chars().all(|c| c == first) {
            let mut err = ValidationError::new("jwt_secret");
            err.message = Some("JWT secret cannot be a repeated character sequence".into());
            return Err(err);
        }
    }

    let unique_chars: std::collections::HashSet<char> = trimmed.chars().collect();
    if unique_chars.len() < 10 {
        let mut err = ValidationError::new("jwt_secret");
        err.message =
            Some("JWT secret must have at least 10 unique characters for adequate entropy".into());
        return Err(err);
    }

    Ok(())
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("marketplace_api={},tower_http=debug", level);
    let filter = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(EnvFilter::new)
        .unwrap_or_else(|| EnvFilter::new(default_directive));

    if json {
        let _ = fmt().with_env_filter(filter).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter).try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    // jwt_secret has no default; it must come from a config file or APP__JWT_SECRET.
    let config = Config::builder()
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .set_default("jwt_expiration", 3600)?
        .set_default("database_url", "sqlite://marketplace.db?mode=rwc")?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    if config.get_string("jwt_secret").is_err() {
        error!("JWT secret is not configured. Set APP__JWT_SECRET environment variable with a secure random string (minimum 64 characters).");
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "jwt_secret is required but not configured. Set APP__JWT_SECRET environment variable."
                .into(),
        )));
    }

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration security validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}
