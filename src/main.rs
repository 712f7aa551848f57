use clap::Parser;
use pollwatch::cli::commands;
use pollwatch::cli::{Cli, Commands};
use pollwatch::{Settings, logging};

fn main() {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    };
    let settings = settings.unwrap_or_else(|e| {
        eprintln!("Configuration error: {e}");
        Settings::default()
    });

    logging::init_with_config(&settings.logging);

    let result = match &cli.command {
        Commands::Init { force } => commands::init::run_init(*force),
        Commands::Config => commands::init::run_config(&settings),
        Commands::Watch(args) => commands::watch::run_watch(&settings, args),
        Commands::Inspect { file, files } => commands::inspect::run_inspect(file, *files),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
