use std::time::Duration;

use clap::{Parser, Subcommand};
use jsonwebtoken::Algorithm;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde_json::Value;

use edge_gateway::http::response::Envelope;
use edge_gateway::security::token::{Claims, TokenSigner, BEARER, DEFAULT_TOKEN_TTL};

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Development CLI for the edge gateway", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mint a bearer token the gateway will accept
    Token {
        /// Shared signing secret
        #[arg(long, env = "JWT_SECRET", default_value = "dev-secret-change-me")]
        secret: String,

        /// Identity placed in the `userId` claim
        #[arg(long)]
        user_id: String,

        /// Roles, comma separated
        #[arg(long, value_delimiter = ',', default_value = "user")]
        roles: Vec<String>,

        /// Lifetime in seconds
        #[arg(long, default_value_t = DEFAULT_TOKEN_TTL.as_secs())]
        ttl_secs: u64,

        /// HMAC algorithm (HS256, HS384, HS512)
        #[arg(long, default_value = "HS256")]
        algorithm: Algorithm,
    },
    /// Send a request through the gateway and print the envelope
    Call {
        /// HTTP method
        method: Method,

        /// Path and query, e.g. /v1/orders?status=new
        path: String,

        #[arg(short, long, env = "GATEWAY_URL", default_value = "http://localhost:8080")]
        url: String,

        /// JSON request body
        #[arg(short, long)]
        data: Option<String>,

        /// Bearer token
        #[arg(short, long)]
        token: Option<String>,

        /// Correlation id to send as X-Request-ID
        #[arg(long)]
        request_id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Token {
            secret,
            user_id,
            roles,
            ttl_secs,
            algorithm,
        } => {
            let claims = Claims::new(user_id, roles, Duration::from_secs(ttl_secs));
            let token = TokenSigner::new(secret.as_bytes(), algorithm).sign(&claims)?;
            println!("{token}");
        }
        Commands::Call {
            method,
            path,
            url,
            data,
            token,
            request_id,
        } => {
            let mut headers = HeaderMap::new();
            if let Some(token) = token {
                headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("{BEARER} {token}"))?);
            }
            if let Some(id) = request_id {
                headers.insert("x-request-id", HeaderValue::from_str(&id)?);
            }

            let mut request = reqwest::Client::new()
                .request(method, format!("{}{}", url.trim_end_matches('/'), path))
                .headers(headers);
            if let Some(body) = data {
                // Fail early on malformed JSON rather than sending it.
                serde_json::from_str::<Value>(&body)?;
                request = request.header(CONTENT_TYPE, "application/json").body(body);
            }

            print_response(request.send().await?).await?;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let request_id = res
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    println!("Status: {status}");
    println!("X-Request-ID: {request_id}");

    let text = res.text().await?;
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => {
            println!("{}", serde_json::to_string_pretty(&json)?);
            if let Ok(Envelope { error: Some(error), .. }) = serde_json::from_value::<Envelope>(json) {
                eprintln!("Error: {} ({})", error.message, error.code);
            }
        }
        Err(_) if text.is_empty() => {}
        Err(_) => println!("{text}"),
    }
    Ok(())
}
