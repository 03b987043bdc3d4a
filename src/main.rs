mod repl;

use ragchat::{ChatController, Config, FileStore, WebhookClient};
use tracing_subscriber::EnvFilter;

fn load_dotenv() {
    // Variables already set in the process environment take precedence.
    if let Err(err) = dotenvy::dotenv()
        && !err.not_found()
    {
        eprintln!("ignoring unreadable .env file: {err}");
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    init_tracing();

    let config = Config::from_env()?;
    let store = match &config.storage_dir {
        Some(dir) => FileStore::new(dir),
        None => FileStore::in_data_dir(),
    };
    tracing::debug!(root = %store.root().display(), "using file store");

    let client = WebhookClient::new(config.endpoint.clone());
    let controller = ChatController::new(
        client,
        store,
        config.storage_keys.clone(),
        config.max_history,
    )?;

    repl::Repl::new(controller).run().await
}
