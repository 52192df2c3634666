//! Operator-invoked batch job: resolves Semantic Scholar paper ids for every
//! thesis that does not have one yet.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use refero::{backfill, config::ScholarConfig, db, scholar::ScholarClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "refero=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite:refero.db?mode=rwc".to_string());
    let pool = db::init_db(&database_url).await?;

    let scholar = ScholarClient::new(ScholarConfig::from_env())?;
    backfill::run(&pool, &scholar, backfill::THROTTLE).await?;

    Ok(())
}
