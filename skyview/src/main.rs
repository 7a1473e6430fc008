use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use skyview::{router, AppState};

/// TESS pixel skyview web app.
#[derive(Parser, Debug)]
#[command(name = "skyview", version, about)]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0:5006")]
    bind: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
    let args = Args::parse();

    let listener = tokio::net::TcpListener::bind(&args.bind).await?;
    info!("listening on http://{}", args.bind);
    axum::serve(listener, router(Arc::new(AppState::new()))).await?;
    Ok(())
}
