use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://api.semanticscholar.org/graph/v1";
pub const DEFAULT_RECOMMEND_BASE: &str =
    "https://api.semanticscholar.org/recommendations/v1/papers/forpaper";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Connection settings for the Semantic Scholar API, read once at startup
/// and passed explicitly to the resolver/fetcher.
#[derive(Debug, Clone)]
pub struct ScholarConfig {
    pub api_base: String,
    pub recommend_base: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl ScholarConfig {
    pub fn from_env() -> Self {
        let api_base =
            std::env::var("SS_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
        let recommend_base = std::env::var("SS_RECOMMEND_BASE")
            .unwrap_or_else(|_| DEFAULT_RECOMMEND_BASE.to_string());
        let api_key = std::env::var("SS_API_KEY").ok().filter(|k| !k.is_empty());
        let timeout_secs = std::env::var("SS_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self {
            api_base,
            recommend_base,
            api_key,
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

impl Default for ScholarConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            recommend_base: DEFAULT_RECOMMEND_BASE.to_string(),
            api_key: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}
