// Copyright 2026 Flatscrape Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use flatscrape::cli;

#[derive(Parser)]
#[command(
    name = "flatscrape",
    about = "Flatscrape: configuration-driven listing extraction",
    version,
    after_help = "Run 'flatscrape <command> --help' for details on each command."
)]
struct Cli {
    /// Output results as JSON (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Directory containing scrapers.json
    #[arg(long, global = true)]
    data_dir: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a listing page into a record
    Extract {
        /// Listing URL
        url: String,
        /// Never start a browser, fetch over plain HTTP only
        #[arg(long)]
        no_browser: bool,
        /// Also print the record mapped onto record-store field ids
        #[arg(long)]
        store_fields: bool,
        /// Identity written to the found_by store field
        #[arg(long)]
        found_by: Option<String>,
    },
    /// Print the canonical form of a listing URL
    Canonicalize {
        /// Listing URL
        url: String,
    },
    /// List configured domains
    Domains,
    /// Check environment and diagnose issues
    Doctor,
    /// Start the HTTP REST API
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Port to listen on
        #[arg(long, default_value = "8080")]
        port: u16,
        /// Never start a browser, fetch over plain HTTP only
        #[arg(long)]
        no_browser: bool,
        /// Launch the browser at startup instead of on the first request
        #[arg(long)]
        warm_up: bool,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_json);

    let data_dir = cli.data_dir.as_deref();
    let result = match cli.command {
        Commands::Extract {
            url,
            no_browser,
            store_fields,
            found_by,
        } => {
            cli::extract_cmd::run(
                &url,
                data_dir,
                no_browser,
                store_fields,
                found_by.as_deref(),
                cli.json,
            )
            .await
        }
        Commands::Canonicalize { url } => cli::canonicalize_cmd::run(&url, data_dir, cli.json).await,
        Commands::Domains => cli::domains_cmd::run(data_dir, cli.json).await,
        Commands::Doctor => cli::doctor::run(data_dir).await,
        Commands::Serve {
            host,
            port,
            no_browser,
            warm_up,
        } => cli::serve::run(&host, port, data_dir, no_browser, warm_up).await,
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "flatscrape", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        if cli.json {
            let kind = e
                .downcast_ref::<flatscrape::ScrapeError>()
                .map(|se| se.kind())
                .unwrap_or("error");
            let body = serde_json::json!({ "success": false, "kind": kind, "message": format!("{e:#}") });
            println!("{body}");
        } else {
            eprintln!("Error: {e:#}");
        }
        std::process::exit(1);
    }

    Ok(())
}

/// Logs go to stderr so command output on stdout stays parseable.
fn init_tracing(level: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
