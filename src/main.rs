//! KiroBar - Kiro credit usage from the command line
//!
//! - One-shot usage report (default command)
//! - Periodic refresh for status bars and scripts (`kirobar watch`)
//! - Offline parsing of saved reports (`kirobar parse`)

mod cli;

use clap::Parser;
use cli::{exit_codes, Cli, Commands};
use kirobar::core::ProviderError;
use kirobar::logging;

fn main() {
    let exit_code = run();
    std::process::exit(exit_code);
}

fn run() -> i32 {
    let cli = Cli::parse();

    // Initialize logging
    if let Err(e) = logging::init(cli.verbose, cli.json_output, cli.log_level.as_deref()) {
        eprintln!("Failed to initialize logging: {}", e);
        return exit_codes::UNEXPECTED_FAILURE;
    }

    // Create tokio runtime for async commands
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create runtime: {}", e);
            return exit_codes::UNEXPECTED_FAILURE;
        }
    };

    let settings = cli.effective_settings();
    let output = cli.output_options();

    let result = rt.block_on(async move {
        match cli.command {
            None | Some(Commands::Usage) => cli::usage::run(&settings, output).await,
            Some(Commands::Watch(args)) => cli::watch::run(args, &settings, output).await,
            Some(Commands::Parse(args)) => cli::parse::run(args, &settings, output).await,
            Some(Commands::Config(args)) => cli::config::run(args, &settings, output.pretty).await,
        }
    });

    match result {
        Ok(()) => exit_codes::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            categorize_error(&e)
        }
    }
}

/// Categorize an error into the appropriate exit code
fn categorize_error(e: &anyhow::Error) -> i32 {
    match e.downcast_ref::<ProviderError>() {
        Some(ProviderError::NotInstalled(_)) => exit_codes::PROVIDER_MISSING,
        Some(ProviderError::Parse(_)) => exit_codes::PARSE_ERROR,
        Some(ProviderError::Timeout) => exit_codes::CLI_TIMEOUT,
        Some(ProviderError::NotAuthenticated) => exit_codes::NOT_AUTHENTICATED,
        _ => exit_codes::UNEXPECTED_FAILURE,
    }
}
