//! Atrium CLI, an admin client for the Atrium API.
//!
//! Set ATRIUM_API_URL and ATRIUM_API_KEY (master key or session token).
//! Orphaned uploads are kept in ATRIUM_RECOVERY_FILE.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use atrium_cli::{format_log_line, init_tracing, parse_id_list, unseen_logs};
use atrium_client::recovery::RecoveryDrainerConfig;
use atrium_client::{
    download_or_open, ApiClient, ClientError, DownloadOutcome, FileRecoveryStore,
    RecoveryDrainer, RecoveryStore, RecoveryTool, UploadRequest, Uploader,
};
use atrium_core::models::{
    ContentKind, CreateCategoryRequest, CreateProductRequest, CreateUserRequest, UserRole,
};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::mpsc;

const LOG_FOLLOW_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "atrium", about = "Atrium admin CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a file and register it as content
    Upload {
        /// audio, pdf or video
        kind: ContentKind,
        file: PathBuf,
        #[arg(long)]
        title: String,
        /// Category ID
        #[arg(long)]
        category: i64,
        /// Cover image URL (PDF only)
        #[arg(long)]
        cover: Option<String>,
    },
    /// Orphaned uploads
    Recover {
        #[command(subcommand)]
        sub: RecoverCommands,
    },
    Categories {
        #[command(subcommand)]
        sub: CategoryCommands,
    },
    Content {
        #[command(subcommand)]
        sub: ContentCommands,
    },
    /// Content grouped by category
    Preview {
        kind: ContentKind,
        /// Comma-separated category IDs
        #[arg(long)]
        categories: Option<String>,
    },
    Users {
        #[command(subcommand)]
        sub: UserCommands,
    },
    Products {
        #[command(subcommand)]
        sub: ProductCommands,
    },
    Telegram {
        #[command(subcommand)]
        sub: TelegramCommands,
    },
    /// Save a media URL locally
    Download { url: String, dest: PathBuf },
}

#[derive(Subcommand)]
enum RecoverCommands {
    List,
    /// Replay every orphan once
    Replay,
    /// Replay on an interval until Ctrl-C
    Drain {
        #[arg(long, default_value = "60")]
        interval_secs: u64,
    },
}

#[derive(Subcommand)]
enum CategoryCommands {
    List {
        #[arg(long)]
        page: Option<i64>,
        #[arg(long)]
        limit: Option<i64>,
    },
    Create {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
}

#[derive(Subcommand)]
enum ContentCommands {
    List {
        kind: ContentKind,
        #[arg(long)]
        category: Option<i64>,
        #[arg(long)]
        page: Option<i64>,
        #[arg(long)]
        limit: Option<i64>,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    List {
        #[arg(long)]
        page: Option<i64>,
        #[arg(long)]
        limit: Option<i64>,
    },
    Create {
        email: String,
        #[arg(long, env = "ATRIUM_NEW_USER_PASSWORD")]
        password: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        admin: bool,
        /// Comma-separated category IDs to grant
        #[arg(long)]
        categories: Option<String>,
    },
    /// Grant a category to a user
    Grant { user_id: i64, category_id: i64 },
    /// Revoke a category from a user
    Revoke { user_id: i64, category_id: i64 },
}

#[derive(Subcommand)]
enum ProductCommands {
    List {
        #[arg(long)]
        page: Option<i64>,
        #[arg(long)]
        limit: Option<i64>,
    },
    Create {
        name: String,
        #[arg(long)]
        price: Decimal,
        #[arg(long, default_value = "USD")]
        currency: String,
        #[arg(long, default_value = "0")]
        stock: i32,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        category: Option<i64>,
        #[arg(long)]
        image_url: Option<String>,
        /// Create hidden from the catalog
        #[arg(long)]
        inactive: bool,
    },
}

#[derive(Subcommand)]
enum TelegramCommands {
    Send { chat_id: String, text: String },
    Logs {
        /// Poll for new entries every 30 seconds until Ctrl-C
        #[arg(long)]
        follow: bool,
        #[arg(long)]
        limit: Option<i64>,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

fn recovery_store() -> Arc<FileRecoveryStore> {
    let store = FileRecoveryStore::from_env();
    tracing::debug!(path = %store.path().display(), "Using recovery file");
    Arc::new(store)
}

async fn run_upload(
    client: ApiClient,
    kind: ContentKind,
    file: PathBuf,
    title: String,
    category: i64,
    cover: Option<String>,
) -> anyhow::Result<()> {
    let mut request = UploadRequest::from_path(kind, &file, title, category)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    if let Some(cover) = cover {
        request = request.with_cover(cover);
    }

    match Uploader::new(client, recovery_store()).upload(request).await {
        Ok(item) => print_json(&item),
        Err(ClientError::Orphaned { key, source }) => Err(anyhow::anyhow!(
            "File stored but registration failed: {}. Saved as {}; run `atrium recover replay` later",
            source,
            key
        )),
        Err(e) => Err(e.into()),
    }
}

async fn run_recover(client: ApiClient, sub: RecoverCommands) -> anyhow::Result<()> {
    let store = recovery_store();
    let tool = RecoveryTool::new(client, store.clone());

    match sub {
        RecoverCommands::List => {
            let entries = store.list().await?;
            let listing: Vec<_> = entries
                .into_iter()
                .map(|(key, record)| serde_json::json!({ "key": key, "record": record }))
                .collect();
            print_json(&listing)?;
        }
        RecoverCommands::Replay => {
            let report = tool.replay_all().await?;
            print_json(&serde_json::json!({
                "recovered": report.recovered.iter().map(|(key, item)| {
                    serde_json::json!({ "key": key, "item": item })
                }).collect::<Vec<_>>(),
                "failed": report.failed.iter().map(|(key, error)| {
                    serde_json::json!({ "key": key, "error": error })
                }).collect::<Vec<_>>(),
            }))?;
        }
        RecoverCommands::Drain { interval_secs } => {
            let (tx, mut rx) = mpsc::channel(8);
            let drainer = RecoveryDrainer::spawn(
                tool,
                RecoveryDrainerConfig {
                    poll_interval: Duration::from_secs(interval_secs.max(1)),
                },
                Some(tx),
            );

            loop {
                tokio::select! {
                    Some(report) = rx.recv() => {
                        for (key, item) in &report.recovered {
                            println!("recovered {} as {} #{}", key, item.kind, item.id);
                        }
                        for (key, error) in &report.failed {
                            println!("still pending {}: {}", key, error);
                        }
                    }
                    result = tokio::signal::ctrl_c() => {
                        result.context("Failed to listen for Ctrl-C")?;
                        break;
                    }
                }
            }

            drainer.shutdown().await;
        }
    }

    Ok(())
}

async fn follow_logs(client: &ApiClient, limit: Option<i64>) -> anyhow::Result<()> {
    let mut last_seen: Option<i64> = None;
    let mut ticker = tokio::time::interval(LOG_FOLLOW_INTERVAL);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match client.telegram_logs(Some(1), limit).await {
                    Ok(page) => {
                        for log in unseen_logs(page.items, last_seen) {
                            println!("{}", format_log_line(&log));
                            last_seen = Some(last_seen.map_or(log.id, |seen| seen.max(log.id)));
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "Failed to fetch Telegram logs"),
                }
            }
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                return Ok(());
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let client = ApiClient::from_env()
        .context("Failed to create API client. Set ATRIUM_API_KEY and ATRIUM_API_URL")?;

    match cli.command {
        Commands::Upload {
            kind,
            file,
            title,
            category,
            cover,
        } => run_upload(client, kind, file, title, category, cover).await?,
        Commands::Recover { sub } => run_recover(client, sub).await?,
        Commands::Categories { sub } => match sub {
            CategoryCommands::List { page, limit } => {
                print_json(&client.list_categories(page, limit).await?)?;
            }
            CategoryCommands::Create { name, description } => {
                let request = CreateCategoryRequest { name, description };
                print_json(&client.create_category(&request).await?)?;
            }
        },
        Commands::Content { sub } => match sub {
            ContentCommands::List {
                kind,
                category,
                page,
                limit,
            } => {
                print_json(&client.list_content(kind, category, page, limit).await?)?;
            }
        },
        Commands::Preview { kind, categories } => {
            let filter = categories.as_deref().map(parse_id_list).transpose()?;
            print_json(&client.preview(kind, filter.as_deref()).await)?;
        }
        Commands::Users { sub } => match sub {
            UserCommands::List { page, limit } => {
                print_json(&client.list_users(page, limit).await?)?;
            }
            UserCommands::Create {
                email,
                password,
                name,
                admin,
                categories,
            } => {
                let request = CreateUserRequest {
                    email,
                    password,
                    name,
                    role: if admin { UserRole::Admin } else { UserRole::Member },
                    category_ids: categories
                        .as_deref()
                        .map(parse_id_list)
                        .transpose()?
                        .unwrap_or_default(),
                };
                print_json(&client.create_user(&request).await?)?;
            }
            UserCommands::Grant {
                user_id,
                category_id,
            } => {
                let added = client.grant_category(user_id, category_id).await?;
                print_json(&serde_json::json!({
                    "user_id": user_id,
                    "category_id": category_id,
                    "added": added
                }))?;
            }
            UserCommands::Revoke {
                user_id,
                category_id,
            } => {
                client.revoke_category(user_id, category_id).await?;
                print_json(&serde_json::json!({
                    "user_id": user_id,
                    "category_id": category_id,
                    "revoked": true
                }))?;
            }
        },
        Commands::Products { sub } => match sub {
            ProductCommands::List { page, limit } => {
                print_json(&client.list_products(page, limit).await?)?;
            }
            ProductCommands::Create {
                name,
                price,
                currency,
                stock,
                description,
                category,
                image_url,
                inactive,
            } => {
                let request = CreateProductRequest {
                    name,
                    description,
                    price,
                    currency,
                    image_url,
                    category_id: category,
                    stock,
                    is_active: !inactive,
                };
                print_json(&client.create_product(&request).await?)?;
            }
        },
        Commands::Telegram { sub } => match sub {
            TelegramCommands::Send { chat_id, text } => {
                print_json(&client.send_telegram(&chat_id, &text).await?)?;
            }
            TelegramCommands::Logs { follow: false, limit } => {
                print_json(&client.telegram_logs(Some(1), limit).await?)?;
            }
            TelegramCommands::Logs { follow: true, limit } => {
                follow_logs(&client, limit).await?;
            }
        },
        Commands::Download { url, dest } => match download_or_open(&client, &url, &dest).await {
            DownloadOutcome::Saved { path, bytes } => {
                print_json(&serde_json::json!({ "saved": path, "bytes": bytes }))?;
            }
            DownloadOutcome::OpenExternally(url) => {
                print_json(&serde_json::json!({ "open_externally": url }))?;
            }
        },
    }

    Ok(())
}
