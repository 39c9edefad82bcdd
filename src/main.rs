use dotenvy::dotenv;
use tracing::{info, warn};

use birthday_shoot::cli::{parse_args, usage, Command};
use birthday_shoot::commands::run_command;
use birthday_shoot::config::CONFIG;
use birthday_shoot::controller::AppController;
use birthday_shoot::history::{FileKeyValueStore, HistoryStore};
use birthday_shoot::llm::GeminiClient;
use birthday_shoot::utils::logging::init_logging;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    let command = match parse_args(&args) {
        Ok(command) => command,
        Err(err) => {
            eprintln!("{err}\n\n{}", usage());
            std::process::exit(2);
        }
    };

    let _guards = init_logging(&CONFIG.log_dir, &CONFIG.log_level);

    let needs_api = matches!(
        command,
        Command::Generate { .. } | Command::Regenerate { .. }
    );
    if needs_api && !CONFIG.has_api_key() {
        warn!("API_KEY is not set; generation requests will fail");
    }

    let backend = FileKeyValueStore::new(&CONFIG.history_storage_path);
    info!(
        "Using history slot '{}' in {}",
        CONFIG.history_storage_key,
        backend.path().display()
    );
    let store = HistoryStore::new(Box::new(backend), CONFIG.history_storage_key.clone());
    let generator = GeminiClient::from_config(&CONFIG);
    if needs_api {
        info!("Generating with model {}", generator.model());
    }

    let mut app = AppController::new(generator, store);
    let mut stdout = std::io::stdout().lock();
    run_command(command, &mut app, &CONFIG.download_file_name, &mut stdout).await
}
