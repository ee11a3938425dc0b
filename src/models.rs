use serde::{Deserialize, Serialize};

/// One normalized job posting as returned by a search source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub url: String,
    pub description: String,
    pub posted_at: Option<String>, // source-native ISO 8601 UTC timestamp
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub first_seen: Option<String>, // assigned by the store at insertion
    pub notified: bool,
}
