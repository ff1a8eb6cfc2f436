use std::sync::Arc;

use actix_web::middleware::Logger;
use actix_web::{App, HttpServer, web};
use anyhow::{Context, Result};
use log::info;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;

use crossrate::{Config, HttpQuoteFetcher, PgRateStore, QueryService, RateStore, Refresher, api};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env().context("Invalid configuration")?;
    info!(
        "Tracking {} via {} ({} dialect)",
        config.currencies, config.base_url, config.dialect
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.http_timeout)
        .connect(&config.database_url)
        .await
        .context("Can't connect to the database")?;
    let pg_store = PgRateStore::new(pool.clone());
    pg_store.migrate().await.context("Can't apply migrations")?;
    let store: Arc<dyn RateStore> = Arc::new(pg_store);

    let fetcher = HttpQuoteFetcher::new(
        config.base_url.clone(),
        config.api_key.clone(),
        config.dialect,
        &config.currencies,
        config.http_timeout,
    )?;
    let refresher = Refresher::new(
        Arc::new(fetcher),
        store.clone(),
        &config.currencies,
        config.refresh_interval,
        config.cycle_timeout,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let refresher_task = tokio::spawn(refresher.run(shutdown_rx));

    let query = web::Data::new(
        QueryService::new(store, config.currencies.clone())
            .with_reject_same_currency(config.reject_same_currency),
    );

    info!("Listening on {}", config.bind_addr);
    // Runs until SIGINT/SIGTERM.
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(query.clone())
            .configure(api::configure)
    })
    .bind(config.bind_addr)
    .with_context(|| format!("Can't bind {}", config.bind_addr))?
    .run()
    .await?;

    info!("Shutting down");
    let _ = shutdown_tx.send(true);
    refresher_task.await?;
    pool.close().await;

    Ok(())
}
