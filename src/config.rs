//! Process configuration from environment variables

use crate::generator::GenerationMode;
use crate::llm::LlmConfig;
use std::path::PathBuf;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_ROOT_SEEDS: &str = "Fire,Water,Earth,Air";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub port: u16,
    pub generation_mode: GenerationMode,
    /// Canonical root concepts; empty means the oracle generates the root
    pub root_seeds: Vec<String>,
    pub llm: LlmConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let db_path = lookup("DISCOVERY_DB_PATH").map_or_else(
            || {
                let home = lookup("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(home).join(".discovery-tree").join("discovery.db")
            },
            PathBuf::from,
        );

        let port = lookup("DISCOVERY_PORT")
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let generation_mode = match lookup("DISCOVERY_GENERATION_MODE") {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to default generation mode");
                GenerationMode::default()
            }),
            None => GenerationMode::default(),
        };

        let root_seeds = parse_seeds(
            &lookup("DISCOVERY_ROOT_SEEDS").unwrap_or_else(|| DEFAULT_ROOT_SEEDS.to_string()),
        );

        Self {
            db_path,
            port,
            generation_mode,
            root_seeds,
            llm: LlmConfig::from_lookup(&lookup),
        }
    }
}

fn parse_seeds(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
