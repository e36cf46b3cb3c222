use std::path::PathBuf;

use axum::http::Method;
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use url::Url;

use relay_proxy::config::load_config;
use relay_proxy::cookies::CredentialsMode;
use relay_proxy::observability::logging;
use relay_proxy::protocol::HeaderList;
use relay_proxy::{ProxiedRequest, Relay};

#[derive(Parser)]
#[command(name = "relay-cli")]
#[command(about = "One-shot requests through the relay engine", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "relay.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a URL and print the decoded status, headers and cookies
    Fetch {
        url: String,

        /// Page the request is issued from (defaults to the URL itself)
        #[arg(long)]
        client: Option<String>,

        #[arg(short = 'X', long, default_value = "GET")]
        method: String,

        /// Extra request header, `name:value`
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,

        /// Request body
        #[arg(short, long)]
        data: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    logging::init(&config.observability);

    let relay = Relay::from_config(&config)?;

    match cli.command {
        Commands::Fetch {
            url,
            client,
            method,
            headers,
            data,
        } => {
            let target = Url::parse(&url)?;
            let client = match client {
                Some(c) => Url::parse(&c)?,
                None => target.clone(),
            };

            let mut req = ProxiedRequest::new(Method::from_bytes(method.to_ascii_uppercase().as_bytes())?);
            req.credentials = CredentialsMode::Include;
            req.headers = parse_headers(&headers)?;
            req.body = data.map(Into::into);

            let cancel = CancellationToken::new();
            req.cancel = Some(cancel.clone());
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            });

            let Some(launched) = relay.launch(req, &target, &client).await else {
                eprintln!("Error: no response for {}", target);
                std::process::exit(1);
            };

            let status = launched.status();
            let relayed = launched.is_relayed();
            let (header_list, cookies) = match &launched.relayed {
                Some(parts) => (parts.headers.clone(), parts.cookies.clone().unwrap_or_default()),
                None => (launched.response.headers.clone(), Vec::new()),
            };
            let body = launched.response.body.bytes().await?;

            let out = json!({
                "url": target.as_str(),
                "status": status,
                "relayed": relayed,
                "headers": headers_json(&header_list),
                "cookies": cookies,
                "body_bytes": body.len(),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
            relay.flush_affinity().await;
        }
    }

    Ok(())
}

fn parse_headers(raw: &[String]) -> Result<HeaderList, String> {
    let mut headers = HeaderList::new();
    for entry in raw {
        let (name, value) = entry
            .split_once(':')
            .ok_or_else(|| format!("header '{entry}' is not name:value"))?;
        headers.append(name.trim(), value.trim());
    }
    Ok(headers)
}

fn headers_json(headers: &HeaderList) -> Value {
    Value::Array(
        headers
            .iter()
            .map(|(name, value)| json!([name, value]))
            .collect(),
    )
}
