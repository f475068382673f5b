use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::layout::{default_layout_config, ClassifierKind, LayoutConfig, PageFormat};

/// Application configuration loaded from environment variables.
/// Every variable has a default; malformed values fail startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub page_format: PageFormat,
    pub classifier: ClassifierKind,
    /// Upper bound on one layout computation, in milliseconds.
    pub layout_timeout_ms: u64,
    /// Requests with more tree nodes than this are rejected.
    pub max_tree_nodes: usize,
    pub min_section_height: Option<f32>,
    pub search_radius: Option<f32>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let config = Config {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            page_format: parse_or("PAGE_FORMAT", read("PAGE_FORMAT"), PageFormat::Letter)?,
            classifier: parse_or("CLASSIFIER", read("CLASSIFIER"), ClassifierKind::Marker)?,
            layout_timeout_ms: parse_or("LAYOUT_TIMEOUT_MS", read("LAYOUT_TIMEOUT_MS"), 2_000)?,
            max_tree_nodes: parse_or("MAX_TREE_NODES", read("MAX_TREE_NODES"), 5_000)?,
            min_section_height: parse_optional("MIN_SECTION_HEIGHT", read("MIN_SECTION_HEIGHT"))?,
            search_radius: parse_optional("SEARCH_RADIUS", read("SEARCH_RADIUS"))?,
        };

        config
            .layout_config()
            .validate()
            .context("layout settings from the environment are invalid")?;
        Ok(config)
    }

    /// Service-wide layout defaults, used when a request carries no config.
    pub fn layout_config(&self) -> LayoutConfig {
        let mut layout = default_layout_config(self.page_format);
        if let Some(height) = self.min_section_height {
            layout.min_section_height = height;
        }
        if let Some(radius) = self.search_radius {
            layout.search_radius = radius;
        }
        layout
    }

    pub fn layout_timeout(&self) -> Duration {
        Duration::from_millis(self.layout_timeout_ms)
    }
}

fn read(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    Ok(parse_optional(key, raw)?.unwrap_or(default))
}

fn parse_optional<T>(key: &str, raw: Option<String>) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    raw.map(|v| {
        v.trim()
            .parse::<T>()
            .map_err(|e| anyhow!("Environment variable '{key}' has an invalid value '{v}': {e}"))
    })
    .transpose()
}
