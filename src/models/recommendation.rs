use serde::{Deserialize, Serialize};

/// A related paper surfaced on the detail page. Ephemeral: built from the
/// recommendations API response and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub authors: Vec<RecommendedAuthor>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(rename = "abstract", default)]
    pub abstract_text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendedAuthor {
    #[serde(default)]
    pub name: Option<String>,
}
