use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Everything the tracker needs for one run, resolved once at startup and
/// passed into component constructors. Nothing below this layer reads the
/// environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub email: EmailSettings,
    pub api: AdzunaCredentials,
    pub search: SearchConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone)]
pub struct EmailSettings {
    pub sender: String,
    pub password: String,
    pub recipient: String,
    pub smtp_server: String,
}

#[derive(Debug, Clone)]
pub struct AdzunaCredentials {
    pub app_id: String,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub keywords: String,
    pub locations: Vec<String>,
    pub max_days_old: u32,
}

#[derive(Debug, Clone)]
pub enum StorageConfig {
    Sqlite { path: PathBuf },
    Dynamo { table_name: String, region: String },
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::load(|key| env::var(key).ok())
    }

    fn load(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut missing: Vec<&str> = Vec::new();
        let mut require = |key: &'static str| -> String {
            match get(key) {
                Some(value) if !value.trim().is_empty() => value,
                _ => {
                    missing.push(key);
                    String::new()
                }
            }
        };

        let sender = require("EMAIL_SENDER");
        let password = require("EMAIL_PASSWORD");
        let recipient = require("EMAIL_RECIPIENT");
        let app_id = require("ADZUNA_APP_ID");
        let api_key = require("ADZUNA_API_KEY");

        if !missing.is_empty() {
            bail!(
                "missing required environment variables: {}",
                missing.join(", ")
            );
        }

        let keywords = get("SEARCH_KEYWORDS")
            .unwrap_or_else(|| "software engineer intern".to_string());
        let locations: Vec<String> = get("SEARCH_LOCATIONS")
            .unwrap_or_else(|| "United States".to_string())
            .split(',')
            .map(|loc| loc.trim().to_string())
            .filter(|loc| !loc.is_empty())
            .collect();
        let max_days_old = match get("MAX_DAYS_OLD") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("invalid MAX_DAYS_OLD value: {raw}"))?,
            None => 7,
        };

        let storage = match get("DB_TYPE").as_deref().unwrap_or("sqlite") {
            "sqlite" => StorageConfig::Sqlite {
                path: get("DB_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(default_db_path),
            },
            "dynamodb" => StorageConfig::Dynamo {
                table_name: get("DYNAMODB_TABLE")
                    .unwrap_or_else(|| "job-tracker".to_string()),
                region: get("AWS_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            },
            other => bail!("unknown DB_TYPE '{}', expected 'sqlite' or 'dynamodb'", other),
        };

        Ok(Self {
            email: EmailSettings {
                sender,
                password,
                recipient,
                smtp_server: get("SMTP_SERVER")
                    .unwrap_or_else(|| "smtp.gmail.com".to_string()),
            },
            api: AdzunaCredentials { app_id, api_key },
            search: SearchConfig {
                keywords,
                locations,
                max_days_old,
            },
            storage,
        })
    }
}

fn default_db_path() -> PathBuf {
    // Use XDG data directory or fallback
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "jobwatch") {
        proj_dirs.data_dir().join("jobs.db")
    } else {
        PathBuf::from("jobs.db")
    }
}
