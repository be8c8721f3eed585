mod api_client;
mod archive;
mod auth;
mod classify;
mod config;
mod data;
mod downloader;
mod error;
mod publisher;
mod runner;
mod spreadsheet;

use clap::{Parser, Subcommand};
use config::Config;
use error::Error;
use log::{error, info};
use std::path::PathBuf;

#[derive(Parser)]
struct Args {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download every available report, reshape it and publish it to storage.
    Run,

    /// Print the reports currently available for download.
    ListReports,

    /// Exchange a Login-with-Amazon authorization code for a refresh token.
    Authorize {
        #[arg(long)]
        code: String,

        #[arg(long)]
        redirect_uri: String,
    },

    /// Reshape a local CSV file without touching the network.
    Melt {
        #[arg(long)]
        input: PathBuf,

        #[arg(long)]
        output: PathBuf,

        #[arg(long, help = "Split this `<identifier>: <value>` column instead of melting")]
        period_column: Option<String>,
    },
}

async fn execute(args: Args) -> Result<(), Error> {
    let config = args.config;

    match args.command {
        Command::Run => {
            let published = runner::run(&config).await?;
            info!("run finished, {} object(s) published", published.len());
        }
        Command::ListReports => {
            for report in runner::list_reports(&config).await? {
                println!("{}", serde_json::to_string(&report)?);
            }
        }
        Command::Authorize { code, redirect_uri } => {
            let refresh_token = runner::authorize(&config, &code, &redirect_uri).await?;
            println!("{}", refresh_token);
        }
        Command::Melt {
            input,
            output,
            period_column,
        } => {
            runner::reshape_file(
                &input,
                &output,
                config.identifier_columns,
                period_column.as_deref(),
            )
            .await?;
            info!("wrote {}", output.display());
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    env_logger::init();

    if let Err(err) = execute(args).await {
        error!("brandview-ingest failed: {}", err);
        std::process::exit(1);
    }
}
