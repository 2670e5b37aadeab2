use std::env;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    MissingVar(&'static str),
    #[error("Invalid value for environment variable {0}")]
    InvalidVar(&'static str),
}

/// Everything the process reads from the environment, gathered once at
/// startup and passed by reference to the components that need it.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub issuer_url: String,
    pub client_id: String,
    pub redirect_domains: Vec<String>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub public_object_search_paths: Vec<String>,
    pub private_object_dir: Option<String>,
    pub sidecar_endpoint: String,
    pub reviewer_emails: Vec<String>,
    pub upload_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Config, ConfigError> {
        let port = match env::var("PORT") {
            Ok(v) => v.parse::<u16>().map_err(|_| ConfigError::InvalidVar("PORT"))?,
            Err(_) => 5000,
        };

        Ok(Config {
            port,
            database_url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::MissingVar("DATABASE_URL"))?,
            issuer_url: env::var("ISSUER_URL")
                .unwrap_or_else(|_| "https://replit.com/oidc".to_string()),
            client_id: env::var("REPL_ID").map_err(|_| ConfigError::MissingVar("REPL_ID"))?,
            redirect_domains: split_csv(&env::var("REPLIT_DOMAINS").unwrap_or_default()),
            openai_api_key: env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
            openai_base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            public_object_search_paths: split_csv(
                &env::var("PUBLIC_OBJECT_SEARCH_PATHS").unwrap_or_default(),
            ),
            private_object_dir: env::var("PRIVATE_OBJECT_DIR").ok().filter(|d| !d.is_empty()),
            sidecar_endpoint: env::var("OBJECT_STORAGE_SIDECAR")
                .unwrap_or_else(|_| "http://127.0.0.1:1106".to_string()),
            reviewer_emails: split_csv(&env::var("REVIEWER_EMAILS").unwrap_or_default()),
            upload_dir: PathBuf::from(env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".into())),
        })
    }

    pub fn is_reviewer(&self, email: Option<&str>) -> bool {
        match email {
            Some(email) => self.reviewer_emails.iter().any(|r| r == email),
            None => false,
        }
    }
}

/// Comma-split, trimmed, empties dropped, duplicates removed in order.
pub fn split_csv(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        if !part.is_empty() && !out.iter().any(|p| p == part) {
            out.push(part.to_string());
        }
    }
    out
}
