use std::process::ExitCode;

use clap::Parser;
use opsdesk_cli::Cli;
use opsdesk_core::config::AppConfig;

fn init_logging(config: &AppConfig) {
    use opsdesk_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    match config.logging.format {
        Compact => builder.compact().init(),
        Pretty => builder.pretty().init(),
        Json => builder.json().init(),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Stdout carries the command outcome; logs go to stderr.
    if let Ok(config) = AppConfig::load(cli.load_options()) {
        init_logging(&config);
    }

    let result = opsdesk_cli::execute(cli);
    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
