use std::time::{SystemTime, UNIX_EPOCH};

use clap::{Parser, Subcommand};
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::json;
use url::form_urlencoded;

use edge_gateway::auth::context::{
    is_auth_field, ACCESS_KEY_HEADER, ACCESS_KEY_HEADER_NAME, NONCE_HEADER, NONCE_HEADER_NAME, SIGN_HEADER,
    SIGN_HEADER_NAME, TIMESTAMP_HEADER, TIMESTAMP_HEADER_NAME,
};
use edge_gateway::auth::signer;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Sign and send requests through the edge gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[arg(short = 'a', long)]
    access_key: String,

    #[arg(short = 's', long)]
    secret_key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the authentication headers for a request path
    Sign {
        /// Path and query, e.g. "/api/hello?name=world"
        path: String,
        #[arg(long)]
        nonce: Option<String>,
        #[arg(long)]
        timestamp: Option<i64>,
    },
    /// Send a signed request and print the response
    Call {
        path: String,
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,
    },
}

struct SignedHeaders {
    nonce: String,
    timestamp: i64,
    sign: String,
}

fn sign_path(cli: &Cli, path: &str, nonce: Option<String>, timestamp: Option<i64>) -> SignedHeaders {
    let nonce = nonce.unwrap_or_else(|| {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(24)
            .map(char::from)
            .collect()
    });
    let timestamp = timestamp.unwrap_or_else(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    });
    let params = signed_params(path);

    let sign = signer::sign(cli.secret_key.as_bytes(), &cli.access_key, &nonce, timestamp, &params);
    SignedHeaders { nonce, timestamp, sign }
}

/// Query parameters the gateway covers with the signature.
fn signed_params(path: &str) -> Vec<(String, String)> {
    path.split_once('?')
        .map(|(_, q)| {
            form_urlencoded::parse(q.as_bytes())
                .into_owned()
                .filter(|(k, _)| !is_auth_field(k))
                .collect()
        })
        .unwrap_or_default()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Sign { path, nonce, timestamp } => {
            let signed = sign_path(&cli, path, nonce.clone(), *timestamp);
            let headers = json!({
                ACCESS_KEY_HEADER_NAME: cli.access_key,
                NONCE_HEADER_NAME: signed.nonce,
                TIMESTAMP_HEADER_NAME: signed.timestamp.to_string(),
                SIGN_HEADER_NAME: signed.sign,
            });
            println!("{}", serde_json::to_string_pretty(&headers)?);
        }
        Commands::Call { path, method } => {
            let signed = sign_path(&cli, path, None, None);
            let mut headers = HeaderMap::new();
            headers.insert(ACCESS_KEY_HEADER, HeaderValue::from_str(&cli.access_key)?);
            headers.insert(NONCE_HEADER, HeaderValue::from_str(&signed.nonce)?);
            headers.insert(TIMESTAMP_HEADER, HeaderValue::from(signed.timestamp));
            headers.insert(SIGN_HEADER, HeaderValue::from_str(&signed.sign)?);

            let method = reqwest::Method::from_bytes(method.to_uppercase().as_bytes())?;
            let res = reqwest::Client::new()
                .request(method, format!("{}{}", cli.url.trim_end_matches('/'), path))
                .headers(headers)
                .send()
                .await?;

            let status = res.status();
            let body = res.text().await?;
            if status.is_success() {
                println!("{}", body);
            } else {
                eprintln!("Error: gateway returned status {}", status);
                if !body.is_empty() {
                    eprintln!("Response: {}", body);
                }
            }
        }
    }

    Ok(())
}
