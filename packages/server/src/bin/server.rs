use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use dynaser_server::{Config, Server};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "dynaser-server")]
#[command(author, version, about = "Serve a server-driven document to browsers", long_about = None)]
struct Cli {
    /// Config file (defaults to dynaser.config.json in the working directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    host: Option<String>,

    #[arg(short, long)]
    port: Option<u16>,

    /// Application to serve (counter, static)
    #[arg(short, long)]
    app: Option<String>,

    /// HTML document for the static application
    #[arg(short, long)]
    document: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => {
            let cwd = std::env::current_dir()?;
            Config::load(&cwd).context("failed to load config")?
        }
    };

    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(document) = cli.document {
        config.document = Some(document);
        if cli.app.is_none() {
            config.app = "static".to_string();
        }
    }
    if let Some(app) = cli.app {
        config.app = app;
    }

    let server = Server::bind(&config).await?;
    server.run().await?;
    Ok(())
}
