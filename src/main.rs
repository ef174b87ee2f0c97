use std::process::ExitCode;

use billbook::{cli, config::CliArgs, Config, Repository};
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("billbook={0},billbook_sqlite={0},billbook_memory={0}", config.logging.level)));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);
    let _ = if config.logging.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

fn main() -> ExitCode {
    let args = CliArgs::parse();
    let config = Config::load(&args);
    init_logging(&config);

    let repo = match Repository::open(&config) {
        Ok(repo) => repo,
        Err(e) => {
            tracing::error!(error = %e, "Failed to open repository");
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        },
    };

    let result = cli::execute(&repo, args.command, args.json);
    repo.shutdown();

    match result {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        },
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        },
    }
}
