use chatrag::cli::print_error;
use chatrag::cli::run_command;
use chatrag::cli::Cli;
use chatrag::config::AppConfig;
use chatrag::ChatRagError;
use chatrag::Result;
use clap::Parser;
use tracing::info;
use tracing::warn;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first; logging reads its directory from it
    let (config, using_defaults) = match &cli.config {
        Some(path) => (AppConfig::from_file(path)?, false),
        None => match AppConfig::load() {
            Ok(config) => (config, false),
            Err(ChatRagError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                (AppConfig::default(), true)
            }
            Err(e) => return Err(e),
        },
    };

    // Initialize logging
    if cli.verbose {
        chatrag::logging::init_logging_with_level("debug", &config.logging.directory)?;
    } else {
        chatrag::logging::init_logging(&config.logging)?;
    }

    if using_defaults {
        warn!("No config file found, using built-in defaults");
    } else {
        info!("Configuration loaded successfully");
    }

    if let Err(e) = run_command(cli.command, &config, cli.verbose).await {
        print_error(&e.to_string());
        return Err(e);
    }
    Ok(())
}
