use embedding_worker::Settings;
use server::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Best effort: a missing .env is normal in production.
    let _ = dotenvy::dotenv();

    let config = ServerConfig::load()?;
    let settings = Settings::load()?;

    server::start_server(config, settings).await
}
