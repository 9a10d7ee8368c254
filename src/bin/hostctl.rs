use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use serde_json::Value;

#[derive(Parser)]
#[command(name = "hostctl")]
#[command(about = "Management CLI for hostplane", long_about = None)]
struct Cli {
    #[arg(short, long, env = "HOSTPLANE_URL", default_value = "http://127.0.0.1:8081")]
    url: String,

    #[arg(short, long, env = "HOSTPLANE_API_KEY", default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show reconciler phase and the applied configuration
    Status,
    /// Run a reconciliation cycle now
    Reconcile,
    /// List proxy hosts
    Hosts,
    /// Enable a proxy host
    Enable { id: u64 },
    /// Disable a proxy host
    Disable { id: u64 },
    /// Delete a proxy host
    Delete { id: u64 },
}

impl Commands {
    fn request(&self) -> (Method, String) {
        match self {
            Commands::Status => (Method::GET, "/api/status".to_string()),
            Commands::Reconcile => (Method::POST, "/api/reconcile".to_string()),
            Commands::Hosts => (Method::GET, "/api/hosts".to_string()),
            Commands::Enable { id } => (Method::POST, format!("/api/hosts/{}/enable", id)),
            Commands::Disable { id } => (Method::POST, format!("/api/hosts/{}/disable", id)),
            Commands::Delete { id } => (Method::DELETE, format!("/api/hosts/{}", id)),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let (method, path) = cli.command.request();
    let res = client
        .request(method, format!("{}{}", cli.url.trim_end_matches('/'), path))
        .headers(headers)
        .send()
        .await?;

    if !print_response(res).await? {
        std::process::exit(1);
    }
    Ok(())
}

/// Prints the body; returns false for non-success statuses.
async fn print_response(res: reqwest::Response) -> Result<bool, Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    let rendered = match serde_json::from_str::<Value>(&text) {
        Ok(json) => serde_json::to_string_pretty(&json)?,
        Err(_) => text,
    };

    if !status.is_success() {
        eprintln!("Error: hostplane API returned status {}", status);
        eprintln!("{}", rendered);
        return Ok(false);
    }

    println!("{}", rendered);
    Ok(true)
}
