//! Configuration module
//!
//! Runtime configuration is read from environment variables (optionally
//! seeded from a `.env` file) and validated once at startup.

use std::env;

use crate::models::ContentKind;
use crate::storage_types::StorageBackend;

// Common constants
const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const JWT_EXPIRY_HOURS: i64 = 24;
const MAX_AUDIO_SIZE_MB: usize = 100;
const MAX_PDF_SIZE_MB: usize = 50;
const MAX_VIDEO_SIZE_MB: usize = 500;
const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Settings shared by every long-running Atrium process
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,
    pub environment: String,
    pub master_api_key: Option<String>,
}

/// Upload constraints for one content kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaLimits {
    pub max_size_bytes: usize,
    pub allowed_extensions: Vec<String>,
    pub allowed_content_types: Vec<String>,
}

impl MediaLimits {
    fn from_env(prefix: &str, default_mb: usize, extensions: &str, content_types: &str) -> Self {
        let max_mb = env::var(format!("MAX_{}_SIZE_MB", prefix))
            .unwrap_or_else(|_| default_mb.to_string())
            .parse::<usize>()
            .unwrap_or(default_mb);

        Self {
            max_size_bytes: max_mb * 1024 * 1024,
            allowed_extensions: split_list(
                &env::var(format!("{}_ALLOWED_EXTENSIONS", prefix))
                    .unwrap_or_else(|_| extensions.to_string()),
            ),
            allowed_content_types: split_list(
                &env::var(format!("{}_ALLOWED_CONTENT_TYPES", prefix))
                    .unwrap_or_else(|_| content_types.to_string()),
            ),
        }
    }

    pub fn allows_extension(&self, extension: &str) -> bool {
        let extension = extension.to_lowercase();
        self.allowed_extensions.iter().any(|e| *e == extension)
    }

    /// Content types are compared without parameters (`; charset=...`).
    pub fn allows_content_type(&self, content_type: &str) -> bool {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase();
        self.allowed_content_types.iter().any(|t| *t == essence)
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

#[derive(Clone, Debug)]
pub struct AtriumConfig {
    pub base: BaseConfig,
    pub database_url: String,
    // Storage configuration
    pub storage_backend: Option<StorageBackend>,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // MinIO and other S3-compatible providers
    pub aws_region: Option<String>,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    // Per-kind upload limits
    pub audio_limits: MediaLimits,
    pub pdf_limits: MediaLimits,
    pub video_limits: MediaLimits,
    // Bootstrap administrator
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    // Telegram relay
    pub telegram_bot_token: Option<String>,
    pub telegram_webhook_secret: Option<String>,
    pub telegram_api_base: String,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<AtriumConfig>);

impl Config {
    fn inner(&self) -> &AtriumConfig {
        &self.0
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        is_production_env(&self.inner().base.environment)
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = AtriumConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.inner().validate()
    }

    pub fn server_port(&self) -> u16 {
        self.inner().base.server_port
    }

    pub fn jwt_secret(&self) -> &str {
        &self.inner().base.jwt_secret
    }

    pub fn jwt_expiry_hours(&self) -> i64 {
        self.inner().base.jwt_expiry_hours
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.inner().base.cors_origins
    }

    pub fn environment(&self) -> &str {
        &self.inner().base.environment
    }

    pub fn db_max_connections(&self) -> u32 {
        self.inner().base.db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.inner().base.db_timeout_seconds
    }

    pub fn master_api_key(&self) -> Option<&str> {
        self.inner().base.master_api_key.as_deref()
    }

    pub fn database_url(&self) -> &str {
        &self.inner().database_url
    }

    pub fn storage_backend(&self) -> Option<StorageBackend> {
        self.inner().storage_backend
    }

    pub fn s3_bucket(&self) -> Option<&str> {
        self.inner().s3_bucket.as_deref()
    }

    pub fn s3_region(&self) -> Option<&str> {
        self.inner().s3_region.as_deref()
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.inner().s3_endpoint.as_deref()
    }

    pub fn aws_region(&self) -> Option<&str> {
        self.inner().aws_region.as_deref()
    }

    pub fn aws_access_key_id(&self) -> Option<&str> {
        self.inner().aws_access_key_id.as_deref()
    }

    pub fn aws_secret_access_key(&self) -> Option<&str> {
        self.inner().aws_secret_access_key.as_deref()
    }

    pub fn local_storage_path(&self) -> Option<&str> {
        self.inner().local_storage_path.as_deref()
    }

    pub fn local_storage_base_url(&self) -> Option<&str> {
        self.inner().local_storage_base_url.as_deref()
    }

    pub fn limits_for(&self, kind: ContentKind) -> &MediaLimits {
        match kind {
            ContentKind::Audio => &self.inner().audio_limits,
            ContentKind::Pdf => &self.inner().pdf_limits,
            ContentKind::Video => &self.inner().video_limits,
        }
    }

    /// Largest upload accepted for any kind; used for the request body limit.
    pub fn max_upload_bytes(&self) -> usize {
        [
            &self.inner().audio_limits,
            &self.inner().pdf_limits,
            &self.inner().video_limits,
        ]
        .iter()
        .map(|l| l.max_size_bytes)
        .max()
        .unwrap_or(0)
    }

    pub fn admin_email(&self) -> Option<&str> {
        self.inner().admin_email.as_deref()
    }

    pub fn admin_password(&self) -> Option<&str> {
        self.inner().admin_password.as_deref()
    }

    pub fn telegram_bot_token(&self) -> Option<&str> {
        self.inner().telegram_bot_token.as_deref()
    }

    pub fn telegram_webhook_secret(&self) -> Option<&str> {
        self.inner().telegram_webhook_secret.as_deref()
    }

    pub fn telegram_api_base(&self) -> &str {
        &self.inner().telegram_api_base
    }
}

fn is_production_env(environment: &str) -> bool {
    let env = environment.to_lowercase();
    env == "production" || env == "prod"
}

impl AtriumConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
        if is_production_env(&environment) && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        let cors_origins: Vec<String> = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();

        let base = BaseConfig {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| "4000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            cors_origins,
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: env::var("DB_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| CONNECTION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            jwt_secret: env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET must be set for authentication"))?,
            jwt_expiry_hours: env::var("JWT_EXPIRY_HOURS")
                .unwrap_or_else(|_| JWT_EXPIRY_HOURS.to_string())
                .parse()
                .unwrap_or(JWT_EXPIRY_HOURS),
            environment,
            master_api_key: env::var("MASTER_API_KEY").ok().filter(|s| !s.is_empty()),
        };

        let storage_backend = env::var("STORAGE_BACKEND")
            .ok()
            .and_then(|s| s.parse::<StorageBackend>().ok());

        let config = AtriumConfig {
            base,
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            storage_backend,
            s3_bucket: env::var("S3_BUCKET").ok(),
            s3_region: env::var("S3_REGION").ok(),
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            aws_region: env::var("AWS_REGION").ok(),
            aws_access_key_id: env::var("AWS_ACCESS_KEY_ID").ok(),
            aws_secret_access_key: env::var("AWS_SECRET_ACCESS_KEY").ok(),
            local_storage_path: env::var("LOCAL_STORAGE_PATH").ok(),
            local_storage_base_url: env::var("LOCAL_STORAGE_BASE_URL").ok(),
            audio_limits: MediaLimits::from_env(
                "AUDIO",
                MAX_AUDIO_SIZE_MB,
                "mp3,m4a,wav,flac,ogg,aac",
                "audio/mpeg,audio/mp4,audio/x-m4a,audio/wav,audio/x-wav,audio/flac,audio/ogg,audio/aac",
            ),
            pdf_limits: MediaLimits::from_env("PDF", MAX_PDF_SIZE_MB, "pdf", "application/pdf"),
            video_limits: MediaLimits::from_env(
                "VIDEO",
                MAX_VIDEO_SIZE_MB,
                "mp4,mov,webm,mkv,ogv,m4v",
                "video/mp4,video/quicktime,video/webm,video/x-matroska,video/ogg,video/x-m4v",
            ),
            admin_email: env::var("ADMIN_EMAIL").ok().filter(|s| !s.is_empty()),
            admin_password: env::var("ADMIN_PASSWORD").ok().filter(|s| !s.is_empty()),
            telegram_bot_token: env::var("TELEGRAM_BOT_TOKEN").ok().filter(|s| !s.is_empty()),
            telegram_webhook_secret: env::var("TELEGRAM_WEBHOOK_SECRET")
                .ok()
                .filter(|s| !s.is_empty()),
            telegram_api_base: env::var("TELEGRAM_API_BASE")
                .unwrap_or_else(|_| TELEGRAM_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.base.jwt_secret.len() < 32 {
            return Err(anyhow::anyhow!(
                "JWT_SECRET must be at least 32 characters long"
            ));
        }

        if !self.database_url.starts_with("postgresql://")
            && !self.database_url.starts_with("postgres://")
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        if self.admin_email.is_some() != self.admin_password.is_some() {
            return Err(anyhow::anyhow!(
                "ADMIN_EMAIL and ADMIN_PASSWORD must be set together"
            ));
        }

        if let Some(password) = &self.admin_password {
            if password.len() < 8 {
                return Err(anyhow::anyhow!(
                    "ADMIN_PASSWORD must be at least 8 characters long"
                ));
            }
        }

        let backend = self.storage_backend.unwrap_or(StorageBackend::Local);
        match backend {
            StorageBackend::S3 => {
                if self.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when using S3 storage backend"
                    ));
                }
                if self.s3_region.is_none() && self.aws_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
                if self.local_storage_base_url.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_BASE_URL must be set when using local storage backend"
                    ));
                }
            }
        }

        Ok(())
    }
}
