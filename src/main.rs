use anyhow::Result;
use hagraph::api::HttpServer;
use hagraph::{Config, Ingestor};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;

    // RUST_LOG wins over hagraph.log_level
    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", &config.hagraph.log_level)
    ).init();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("serve");

    match command {
        "ingest" => run_ingest_once(config).await?,
        "serve" => run_http_server(config).await?,
        other => anyhow::bail!("Unknown command '{}'. Use 'serve' or 'ingest'.", other),
    }

    Ok(())
}

/// Serve the graph API until interrupted
async fn run_http_server(config: Config) -> Result<()> {
    log::info!("Starting hagraph v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Controller: {}", config.controller.url);

    let ingestor = Ingestor::from_config(&config)?;
    let server = HttpServer::new(ingestor, config);
    server.run().await?;

    Ok(())
}

/// Run a single ingestion cycle and print the report as JSON
async fn run_ingest_once(config: Config) -> Result<()> {
    let ingestor = Ingestor::from_config(&config)?;

    let report = ingestor.ingest().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
