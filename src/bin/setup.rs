// 初始化：建表、创建管理员、清理过期缓存，可选同步客户

use std::io;

use blvq_backend::{
    config::Config,
    database::{
        self, CacheStore, PgCacheRepository, PgCustomerLinkRepository, PgCustomerRepository,
        PgUserRepository, UserStore, models::user::ADMIN_ROLE,
    },
    ewity::EwityClient,
    operations::CustomerSync,
    utils::hash_password,
};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
#[command(
    name = "blvq-setup",
    about = "Prepare the BLVQ database and create the first admin account",
    version
)]
struct CliArgs {
    /// 管理员用户名
    #[arg(long, env = "ADMIN_USERNAME", default_value = "admin")]
    admin_username: String,
    /// 新建管理员时使用的密码
    #[arg(long, env = "ADMIN_PASSWORD", hide_env_values = true)]
    admin_password: Option<String>,
    /// 从 Ewity 全量同步客户到本地缓存表
    #[arg(long)]
    sync_customers: bool,
}

fn failed(context: &str, error: impl std::fmt::Display) -> io::Error {
    io::Error::other(format!("{context}: {error}"))
}

#[tokio::main]
async fn main() -> io::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = CliArgs::parse();
    let config = Config::from_env().map_err(|e| failed("load configuration", e))?;

    println!("1. Connecting to database");
    let pool = database::connect(&config)
        .await
        .map_err(|e| failed("connect to database", e))?;

    println!("2. Initializing schema");
    database::initialize_schema(&pool)
        .await
        .map_err(|e| failed("initialize schema", e))?;

    println!("3. Creating admin user");
    let users = PgUserRepository::new(pool.clone());
    let existing = users
        .find_by_username(&args.admin_username)
        .await
        .map_err(|e| failed("look up admin", e))?;
    match existing {
        Some(_) => println!("   admin '{}' already exists, skipping", args.admin_username),
        None => {
            let password = args.admin_password.as_deref().ok_or_else(|| {
                io::Error::other("ADMIN_PASSWORD is required to create the admin user")
            })?;
            let hash = hash_password(password).map_err(|e| failed("hash password", e))?;
            let admin = users
                .create(&args.admin_username, &hash, ADMIN_ROLE)
                .await
                .map_err(|e| failed("create admin", e))?;
            println!("   created admin '{}' ({})", admin.username, admin.id);
        }
    }

    println!("4. Purging expired cache entries");
    let purged = PgCacheRepository::new(pool.clone())
        .purge_expired()
        .await
        .map_err(|e| failed("purge cache", e))?;
    println!("   removed {purged} entries");

    if args.sync_customers {
        println!("5. Syncing customers from Ewity");
        let ewity =
            EwityClient::from_config(&config).map_err(|e| failed("create Ewity client", e))?;
        let customers = PgCustomerRepository::new(pool.clone());
        let links = PgCustomerLinkRepository::new(pool.clone());

        let report = CustomerSync::new(&ewity, &customers, &links)
            .run()
            .await
            .map_err(|e| failed("sync customers", e))?;
        println!("total={}", report.total);
        println!("new={}", report.new);
        println!("updated={}", report.updated);
        println!("pages={}", report.pages);
        println!("links_updated={}", report.links_updated);
    } else {
        println!("5. Skipping customer sync (pass --sync-customers to run it)");
    }

    println!("Setup complete, API base: {}", config.api_base_uri);
    Ok(())
}
