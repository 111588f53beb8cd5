use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::Value;

use sinkplot::config::load_config;

#[derive(Parser)]
#[command(name = "sinkctl")]
#[command(about = "Control CLI for a running sinkplot gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8443")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Push a config file to the gateway
    Apply {
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Check that the control endpoint is alive
    Health,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let ok = match cli.command {
        Commands::Apply { file } => {
            // Decode locally so a typo is caught before anything is sent.
            let config = load_config(&file)?;
            let res = client
                .post(format!("{base}/config"))
                .json(&config)
                .send()
                .await?;
            print_text(res).await?
        }
        Commands::Health => {
            let res = client.get(format!("{base}/healthz")).send().await?;
            print_json(res).await?
        }
    };

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

async fn print_text(res: reqwest::Response) -> Result<bool, Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    if status.is_success() {
        print!("{text}");
    } else {
        eprintln!("Error: control endpoint returned status {status}");
        eprint!("{text}");
    }
    Ok(status.is_success())
}

async fn print_json(res: reqwest::Response) -> Result<bool, Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: control endpoint returned status {status}");
        if let Ok(text) = res.text().await {
            eprintln!("Response: {text}");
        }
        return Ok(false);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(true)
}
