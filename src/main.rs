use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use iamresponding::cli::{
    commands::{Cli, Commands},
    completions::generate_completions,
    run::{run_fetch, run_login},
};

fn setup_logging(verbosity: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbosity {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("iamresponding=info"),
            2 => EnvFilter::new("iamresponding=debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Login { login } => {
            run_login(login).await?;
        }

        Commands::Fetch { login, json, feed } => {
            run_fetch(login, json, feed).await?;
        }

        Commands::Completions { shell } => {
            generate_completions(shell);
        }
    }

    Ok(())
}
