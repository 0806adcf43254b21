//! Application state and sub-state extractors.
//!
//! AppState is split into sub-states so handlers can extract only what they
//! need via Axum's `FromRef`.

use std::sync::Arc;

use atrium_core::models::ContentKind;
use atrium_core::{Config, MediaLimits};
use atrium_db::{
    CategoryRepository, ContentRepository, OrderRepository, ProductRepository,
    TelegramRepository, UserRepository,
};
use atrium_storage::Storage;
use sqlx::PgPool;

use crate::auth::jwt::JwtService;
use crate::services::telegram::TelegramClient;

/// Database pool and every repository.
#[derive(Clone)]
pub struct DbState {
    pub pool: PgPool,
    pub categories: CategoryRepository,
    pub content: ContentRepository,
    pub users: UserRepository,
    pub products: ProductRepository,
    pub orders: OrderRepository,
    pub telegram: TelegramRepository,
}

impl DbState {
    pub fn new(pool: PgPool) -> Self {
        Self {
            categories: CategoryRepository::new(pool.clone()),
            content: ContentRepository::new(pool.clone()),
            users: UserRepository::new(pool.clone()),
            products: ProductRepository::new(pool.clone()),
            orders: OrderRepository::new(pool.clone()),
            telegram: TelegramRepository::new(pool.clone()),
            pool,
        }
    }
}

/// Object storage and per-kind upload limits.
#[derive(Clone)]
pub struct MediaConfig {
    pub storage: Arc<dyn Storage>,
    pub audio: MediaLimits,
    pub pdf: MediaLimits,
    pub video: MediaLimits,
}

impl MediaConfig {
    pub fn new(config: &Config, storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            audio: config.limits_for(ContentKind::Audio).clone(),
            pdf: config.limits_for(ContentKind::Pdf).clone(),
            video: config.limits_for(ContentKind::Video).clone(),
        }
    }

    pub fn limits_for(&self, kind: ContentKind) -> &MediaLimits {
        match kind {
            ContentKind::Audio => &self.audio,
            ContentKind::Pdf => &self.pdf,
            ContentKind::Video => &self.video,
        }
    }
}

/// Token issuing and verification.
#[derive(Clone)]
pub struct AuthConfig {
    pub jwt: JwtService,
    pub master_api_key: Option<String>,
}

/// Bot API client and webhook secret.
#[derive(Clone)]
pub struct TelegramState {
    pub client: TelegramClient,
    pub default_bot_token: Option<String>,
    pub webhook_secret: Option<String>,
}

/// Main application state: aggregates sub-states for dependency injection.
#[derive(Clone)]
pub struct AppState {
    pub db: DbState,
    pub media: MediaConfig,
    pub auth: AuthConfig,
    pub telegram: TelegramState,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config, pool: PgPool, storage: Arc<dyn Storage>) -> anyhow::Result<Self> {
        Ok(Self {
            db: DbState::new(pool),
            media: MediaConfig::new(&config, storage),
            auth: AuthConfig {
                jwt: JwtService::new(config.jwt_secret(), config.jwt_expiry_hours()),
                master_api_key: config.master_api_key().map(String::from),
            },
            telegram: TelegramState {
                client: TelegramClient::new(config.telegram_api_base())?,
                default_bot_token: config.telegram_bot_token().map(String::from),
                webhook_secret: config.telegram_webhook_secret().map(String::from),
            },
            config,
        })
    }
}

// ----- FromRef for sub-state extraction -----

impl axum::extract::FromRef<Arc<AppState>> for DbState {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.db.clone()
    }
}

impl axum::extract::FromRef<Arc<AppState>> for MediaConfig {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.media.clone()
    }
}

impl axum::extract::FromRef<Arc<AppState>> for AuthConfig {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.auth.clone()
    }
}

impl axum::extract::FromRef<Arc<AppState>> for TelegramState {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.telegram.clone()
    }
}

fn _assert_app_state_send_sync() {
    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}
    assert_send::<AppState>();
    assert_sync::<AppState>();
}
