//! SkinDex服务器主程序

mod seed;

use anyhow::Context;
use clap::Parser;
use skindex_admin::{init_tracing, SkindexConfig};
use skindex_database::{DatabasePool, MemoryRepository, PgRepository, Repository};
use skindex_storage::ImageStore;
use skindex_web::{AppState, AuthService, AuthSettings, WebServer};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// SkinDex服务器命令行参数
#[derive(Parser, Debug)]
#[command(name = "skindex-server")]
#[command(about = "SkinDex 皮肤影像分诊服务器")]
struct Args {
    /// 配置文件路径
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 使用内存存储代替PostgreSQL（仅用于开发和演示）
    #[arg(long)]
    in_memory: bool,

    /// 日志级别，覆盖配置文件
    #[arg(short, long)]
    log_level: Option<String>,
}

fn auth_settings(config: &SkindexConfig) -> AuthSettings {
    AuthSettings {
        jwt_secret: config.auth.jwt_secret.clone(),
        issuer: config.auth.issuer.clone(),
        audience: config.auth.audience.clone(),
        token_ttl_secs: config.auth.token_ttl_secs,
        bcrypt_cost: config.auth.bcrypt_cost,
        allow_admin_registration: config.auth.allow_admin_registration,
    }
}

async fn open_repository(config: &SkindexConfig, in_memory: bool) -> anyhow::Result<Arc<dyn Repository>> {
    if in_memory {
        warn!("Using in-memory repository, data will be lost on shutdown");
        return Ok(Arc::new(MemoryRepository::new()));
    }

    let pool = DatabasePool::connect(
        &config.database.url,
        config.database.max_connections,
        Duration::from_secs(config.database.connect_timeout_secs),
    )
    .await?;
    let repo = PgRepository::new(pool);
    repo.create_tables().await?;
    Ok(Arc::new(repo))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = SkindexConfig::load(args.config.as_deref())?;
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    init_tracing(&config.logging)?;
    config.log_summary(args.config.as_deref());

    info!("Starting SkinDex server...");
    info!("  listen: {}", config.bind_address());
    info!("  upload root: {}", config.storage.upload_root);

    let repo = open_repository(&config, args.in_memory).await?;
    let store = ImageStore::local(&config.storage.upload_root)?;
    let auth = AuthService::new(auth_settings(&config));

    if let Some(seed) = &config.seed_admin {
        seed::ensure_admin(repo.as_ref(), &auth, seed).await?;
    }

    let state = AppState::new(repo, store, auth)?.with_max_upload_bytes(config.server.max_upload_bytes);
    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .with_context(|| format!("Invalid listen address: {}", config.bind_address()))?;

    if let Err(e) = WebServer::new(addr, state).run().await {
        error!("Server failed: {}", e);
        return Err(e);
    }

    Ok(())
}
