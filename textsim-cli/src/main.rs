//! textsim-cli: command-line client for the textsim HTTP API
//!
//! # Subcommands
//! - `score <text1> <text2> [--session <id>]` - similarity score (percentage)
//! - `intents <text>` - five search intents for a text
//! - `session new` - mint a session id
//! - `session get <id>` - show stored data + summary
//! - `session save <id> <data-json>` - create/update a session
//! - `status` - show server health
//!
//! `--json` prints the raw response body instead of the human-readable form.

use clap::{Parser, Subcommand};
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8000";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "textsim-cli",
    version,
    about = "textsim: text similarity and search-intent client"
)]
struct Cli {
    /// textsim HTTP server URL (overrides TEXTSIM_HTTP_URL env var)
    #[arg(long, env = "TEXTSIM_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    /// Print raw JSON responses
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Score the semantic similarity of two texts
    Score {
        text1: String,
        text2: String,

        /// Session the text pair is recorded under
        #[arg(long, default_value = "cli")]
        session: String,
    },

    /// Generate search intents for a text
    Intents { text: String },

    /// Manage sessions
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// Show textsim server status
    Status,
}

#[derive(Debug, Subcommand)]
enum SessionAction {
    /// Request a fresh session id
    New,
    /// Show a session's data and summary
    Get { session_id: String },
    /// Save a JSON object as the session's data
    Save { session_id: String, data: String },
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SimilarityResponse {
    pub similarity_score: f64,
    pub session_id: String,
    #[serde(default = "default_true")]
    pub score_available: bool,
    pub reason: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct IntentsResponse {
    pub intents: Vec<String>,
}

/// One-line rendering of a similarity response.
pub fn format_score(resp: &SimilarityResponse) -> String {
    if resp.score_available {
        format!("Similarity: {:.2}%  (session {})", resp.similarity_score, resp.session_id)
    } else {
        format!(
            "Similarity unavailable: {}  (session {})",
            resp.reason.as_deref().unwrap_or("unknown reason"),
            resp.session_id
        )
    }
}

/// Parse the `session save` data argument; it must be a non-empty JSON object.
pub fn parse_session_data(raw: &str) -> anyhow::Result<serde_json::Value> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| anyhow::anyhow!("data must be valid JSON: {}", e))?;
    match value.as_object() {
        Some(obj) if !obj.is_empty() => Ok(value),
        _ => Err(anyhow::anyhow!("data must be a non-empty JSON object")),
    }
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

struct Api {
    client: reqwest::blocking::Client,
    server: String,
}

impl Api {
    fn new(server: &str) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            server: server.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.server, path)
    }

    /// Send a request and return the JSON body, exiting on transport or HTTP errors.
    fn send(&self, req: reqwest::blocking::RequestBuilder, url: &str) -> anyhow::Result<serde_json::Value> {
        let resp = match req.send() {
            Ok(r) => r,
            Err(e) => {
                eprintln!("textsim-cli: connection failed to {}: {}", url, e);
                std::process::exit(1);
            }
        };

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            eprintln!("textsim-cli: server returned {}: {}", status, body);
            std::process::exit(1);
        }

        Ok(resp.json()?)
    }
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn do_score(api: &Api, text1: &str, text2: &str, session: &str, json: bool) -> anyhow::Result<()> {
    let url = api.url("/api/get_similarity/");
    let req = api
        .client
        .post(&url)
        .query(&[("session_id", session)])
        .form(&[("text1", text1), ("text2", text2)]);
    let body = api.send(req, &url)?;

    if json {
        return print_json(&body);
    }
    let resp: SimilarityResponse = serde_json::from_value(body)?;
    println!("{}", format_score(&resp));
    Ok(())
}

fn do_intents(api: &Api, text: &str, json: bool) -> anyhow::Result<()> {
    let url = api.url("/api/generate_search_intents/");
    let req = api.client.post(&url).json(&serde_json::json!({ "text": text }));
    let body = api.send(req, &url)?;

    if json {
        return print_json(&body);
    }
    let resp: IntentsResponse = serde_json::from_value(body)?;
    for (i, intent) in resp.intents.iter().enumerate() {
        println!("{}. {}", i + 1, intent);
    }
    Ok(())
}

fn do_session(api: &Api, action: SessionAction, json: bool) -> anyhow::Result<()> {
    let body = match action {
        SessionAction::New => {
            let url = api.url("/api/get_session_id/");
            api.send(api.client.post(&url), &url)?
        }
        SessionAction::Get { session_id } => {
            let url = api.url("/api/get_session_data/");
            api.send(api.client.get(&url).query(&[("session_id", &session_id)]), &url)?
        }
        SessionAction::Save { session_id, data } => {
            let data = parse_session_data(&data)?;
            let url = api.url("/api/save_session/");
            let req = api
                .client
                .post(&url)
                .json(&serde_json::json!({ "session_id": session_id, "data": data }));
            api.send(req, &url)?
        }
    };

    if json {
        return print_json(&body);
    }

    if let Some(id) = body["session_id"].as_str() {
        println!("{}", id);
    } else if body.get("success").is_some() {
        println!("Saved. Summary: {}", body["summary"].as_str().unwrap_or("(none)"));
    } else if body["data"].is_null() {
        println!("No session data found");
    } else {
        println!("Summary: {}", body["summary"].as_str().unwrap_or("(none)"));
        print_json(&body["data"])?;
    }
    Ok(())
}

/// Show the server status by calling GET /health.
fn do_status(api: &Api) -> anyhow::Result<()> {
    let url = api.url("/health");
    match api.client.get(&url).send() {
        Ok(r) if r.status().is_success() => {
            let body: serde_json::Value = r.json().unwrap_or_default();
            println!("textsim server: {}", body["status"].as_str().unwrap_or("unknown"));
            println!("Version:        {}", body["version"].as_str().unwrap_or("?"));
            println!("PostgreSQL:     {}", body["postgresql"].as_str().unwrap_or("?"));
        }
        Ok(r) => {
            eprintln!("textsim-cli: server unhealthy (HTTP {})", r.status());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("textsim-cli: cannot reach {}: {}", url, e);
            std::process::exit(1);
        }
    }
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();

    let result = Api::new(&cli.server).and_then(|api| match cli.command {
        Commands::Score { text1, text2, session } => {
            do_score(&api, &text1, &text2, &session, cli.json)
        }
        Commands::Intents { text } => do_intents(&api, &text, cli.json),
        Commands::Session { action } => do_session(&api, action, cli.json),
        Commands::Status => do_status(&api),
    });

    if let Err(e) = result {
        eprintln!("textsim-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================
