use stackflow::{config, run, setup_store};

#[tokio::main]
async fn main() -> Result<(), handle_errors::Error> {
    dotenv::dotenv().ok();
    let config = config::Config::new()?;
    let store = setup_store(&config).await?;
    tracing::info!("stackflow build ID {}", env!("STACKFLOW_VERSION"));
    run(config, store).await;
    Ok(())
}
