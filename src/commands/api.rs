//! `api-server`, `api-test`, `api-docs` and `generate-api-client`

use super::Context;
use crate::config::Config;
use crate::error::{InventoryError, Result};
use crate::web::{serve, AppState, API_NAME, API_VERSION};
use clap::{Args, ValueEnum};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Args, Debug)]
pub struct ServerArgs {
    /// Bind address (defaults to api.host from the config)
    #[arg(long)]
    pub host: Option<String>,
    /// Port (defaults to api.port from the config)
    #[arg(long)]
    pub port: Option<u16>,
}

pub async fn server(ctx: Context, args: &ServerArgs) -> Result<()> {
    let host = args.host.clone().unwrap_or_else(|| ctx.config.api.host.clone());
    let port = args.port.unwrap_or(ctx.config.api.port);
    let photos = Arc::new(ctx.photos());
    let state = AppState::new(Arc::new(Mutex::new(ctx.conn)), photos);

    println!("🚀 Starting {} v{}", API_NAME, API_VERSION);
    println!("   Listening on http://{}:{}", host, port);
    println!("   Documentation: inv api-docs");
    println!("   Press Ctrl-C to stop");
    serve(state, &host, port).await
}

#[derive(Args, Debug)]
pub struct TestArgs {
    #[arg(long)]
    pub host: Option<String>,
    #[arg(long)]
    pub port: Option<u16>,
}

/// Endpoints hit by `api-test`, with a label for the report
const TEST_ENDPOINTS: &[(&str, &str)] = &[
    ("API info", "/"),
    ("Statistics", "/api/stats"),
    ("Items", "/api/items?limit=5"),
    ("Locations", "/api/locations"),
    ("Search", "/api/search?q=nike"),
];

/// One-line summary of an endpoint's JSON body
fn describe_response(path: &str, body: &Value) -> String {
    match path {
        "/" => format!(
            "{} {}",
            body["name"].as_str().unwrap_or("?"),
            body["version"].as_str().unwrap_or("?")
        ),
        "/api/stats" => format!(
            "{} items, {} available",
            body["inventory"]["total_items"],
            body["inventory"]["available_items"]
        ),
        "/api/locations" => format!(
            "{} locations",
            body["locations"].as_array().map_or(0, Vec::len)
        ),
        _ => format!("{} results", body["total"]),
    }
}

pub async fn test(config: &Config, args: &TestArgs) -> Result<()> {
    let host = args.host.clone().unwrap_or_else(|| match config.api.host.as_str() {
        "0.0.0.0" => "127.0.0.1".to_string(),
        other => other.to_string(),
    });
    let port = args.port.unwrap_or(config.api.port);
    let base_url = format!("http://{}:{}", host, port);
    println!("🧪 Testing API at {}", base_url);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()?;

    let mut failures = 0;
    for (label, path) in TEST_ENDPOINTS {
        let url = format!("{}{}", base_url, path);
        log::debug!("GET {}", url);
        let outcome = async {
            let response = client.get(&url).send().await?;
            let status = response.status();
            let body: Value = response.json().await?;
            Ok::<_, reqwest::Error>((status, body))
        }
        .await;

        match outcome {
            Ok((status, body)) if status.is_success() => {
                println!("  ✅ {}: {}", label, describe_response(path, &body));
            }
            Ok((status, body)) => {
                failures += 1;
                println!("  ❌ {}: HTTP {} {}", label, status.as_u16(), body["error"]);
            }
            Err(e) if e.is_connect() => {
                return Err(InventoryError::validation(format!(
                    "Could not connect to {}. Start the server with 'inv api-server'",
                    base_url
                )));
            }
            Err(e) => {
                failures += 1;
                println!("  ❌ {}: {}", label, e);
            }
        }
    }

    if failures == 0 {
        println!("\n✅ All API endpoints responded");
    } else {
        println!("\n⚠️  {} endpoint(s) failed", failures);
    }
    Ok(())
}

const API_DOCS: &str = "\
Endpoints:

  GET  /
       API name, version and endpoint list

  GET  /api/items
       Query: brand, condition, status (default: available, empty for all),
              location_id, ownership_type, limit (default: 100), offset
       Returns: {items, total, limit, offset}; each item carries primary_photo
                and photos

  GET  /api/items/{sku}
       One item with photo details. 404 when the SKU is unknown

  PUT  /api/items/{sku}
       Body (all optional): current_price, notes, condition, location_id,
                            status, sold_price
       Marking an item sold requires sold_price

  GET  /api/locations
       Active locations with available item counts

  GET  /api/consigners
       Consigners with statistics

  GET  /api/search?q=<text>&limit=50
       Text search across brand, model, color, SKU and notes

  GET  /api/stats
       Inventory, value, brand and photo statistics

  POST /api/webhook/item-updated
       Accepts any payload and acknowledges it

Errors are returned as {\"error\": \"message\"} with status 400, 404 or 500.
";

pub fn docs() {
    println!("📚 {} v{}", API_NAME, API_VERSION);
    println!("{}", "=".repeat(50));
    print!("{}", API_DOCS);
    println!("\nExample:");
    println!("  curl http://localhost:5000/api/items?brand=nike&limit=10");
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientLanguage {
    Python,
    Javascript,
    Curl,
}

impl ClientLanguage {
    fn template(&self) -> &'static str {
        match self {
            ClientLanguage::Python => include_str!("../../templates/client.py"),
            ClientLanguage::Javascript => include_str!("../../templates/client.js"),
            ClientLanguage::Curl => include_str!("../../templates/client.sh"),
        }
    }

    fn default_filename(&self) -> &'static str {
        match self {
            ClientLanguage::Python => "inventory_client.py",
            ClientLanguage::Javascript => "inventory_client.js",
            ClientLanguage::Curl => "inventory_api.sh",
        }
    }
}

#[derive(Args, Debug)]
pub struct ClientArgs {
    #[arg(value_enum)]
    pub language: ClientLanguage,
    /// Output file (defaults to a name per language)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    #[arg(long, default_value = "localhost")]
    pub host: String,
    #[arg(long, default_value_t = 5000)]
    pub port: u16,
}

#[cfg(unix)]
fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Client source for `language` pointed at `base_url`
pub fn client_source(language: ClientLanguage, base_url: &str) -> String {
    language.template().replace("{{BASE_URL}}", base_url)
}

pub fn generate_client(args: &ClientArgs) -> Result<()> {
    let base_url = format!("http://{}:{}", args.host, args.port);
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(args.language.default_filename()));

    std::fs::write(&output, client_source(args.language, &base_url))?;
    if args.language == ClientLanguage::Curl {
        make_executable(&output)?;
    }

    println!("✅ Generated {:?} client: {}", args.language, output.display());
    println!("   Base URL: {}", base_url);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_templates_get_base_url() {
        for language in [
            ClientLanguage::Python,
            ClientLanguage::Javascript,
            ClientLanguage::Curl,
        ] {
            let source = client_source(language, "http://example.test:8080");
            assert!(source.contains("http://example.test:8080"));
            assert!(!source.contains("{{BASE_URL}}"));
        }
    }

    #[test]
    fn generate_client_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("client.py");
        generate_client(&ClientArgs {
            language: ClientLanguage::Python,
            output: Some(output.clone()),
            host: "localhost".to_string(),
            port: 5000,
        })
        .unwrap();
        let source = std::fs::read_to_string(output).unwrap();
        assert!(source.contains("http://localhost:5000"));
    }

    #[test]
    fn response_summaries() {
        let stats = json!({"inventory": {"total_items": 4, "available_items": 3}});
        assert_eq!(describe_response("/api/stats", &stats), "4 items, 3 available");
        let info = json!({"name": API_NAME, "version": API_VERSION});
        assert_eq!(
            describe_response("/", &info),
            "Streetwear Inventory API 1.0.0"
        );
        assert_eq!(describe_response("/api/search?q=nike", &json!({"total": 2})), "2 results");
    }
}
