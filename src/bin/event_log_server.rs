use anyhow::{Context, Result};
use clap::Parser;
use motion_sentry_rs::event_log::{router, EventStore};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Parser, Debug)]
#[command(name = "event_log_server")]
#[command(about = "Receives motion records from sentry nodes and lists them", long_about = None)]
struct Args {
    /// Port to serve on
    #[arg(long, default_value = "5000")]
    port: u16,

    /// JSON-lines file holding the records
    #[arg(long, default_value = "motion_logs.jsonl")]
    db: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let store = EventStore::open(&args.db)
        .await
        .with_context(|| format!("opening event store {}", args.db.display()))?;
    let app = router(Arc::new(store));

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    log::info!("Event log server listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
