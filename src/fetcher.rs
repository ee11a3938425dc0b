use std::collections::HashSet;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::AdzunaCredentials;
use crate::models::Listing;

const ADZUNA_API_URL: &str = "https://api.adzuna.com/v1/api/jobs";
const COUNTRY: &str = "us";
const RESULTS_PER_PAGE: u32 = 50;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A searchable source of job listings.
pub trait JobSource {
    /// Query every location in order and return the combined candidate set,
    /// deduplicated by id (first occurrence wins). A failed location query
    /// contributes zero listings; it never aborts the search.
    fn search(&self, keywords: &str, locations: &[String], max_days_old: u32) -> Vec<Listing>;
}

pub struct AdzunaFetcher {
    app_id: String,
    api_key: String,
    base_url: String,
    client: reqwest::blocking::Client,
}

impl AdzunaFetcher {
    pub fn new(credentials: &AdzunaCredentials) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            app_id: credentials.app_id.clone(),
            api_key: credentials.api_key.clone(),
            base_url: ADZUNA_API_URL.to_string(),
            client,
        })
    }

    #[cfg(test)]
    fn with_base_url(credentials: &AdzunaCredentials, base_url: &str) -> Result<Self> {
        let mut fetcher = Self::new(credentials)?;
        fetcher.base_url = base_url.to_string();
        Ok(fetcher)
    }

    fn fetch_location(
        &self,
        keywords: &str,
        location: &str,
        max_days_old: u32,
    ) -> Result<Vec<Listing>> {
        let url = format!("{}/{}/search/1", self.base_url, COUNTRY);
        let per_page = RESULTS_PER_PAGE.to_string();
        let max_age = max_days_old.to_string();

        let response = self
            .client
            .get(&url)
            .query(&[
                ("app_id", self.app_id.as_str()),
                ("app_key", self.api_key.as_str()),
                ("what", keywords),
                ("results_per_page", per_page.as_str()),
                ("content-type", "application/json"),
                ("max_days_old", max_age.as_str()),
                ("where", location),
            ])
            .send()
            .context("Failed to send search request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().unwrap_or_default();
            return Err(anyhow!(
                "Search request failed with status {}: {}",
                status,
                error_text
            ));
        }

        let body: SearchResponse = response
            .json()
            .context("Failed to parse search response")?;
        Ok(body.results.into_iter().map(RawListing::into_listing).collect())
    }
}

impl JobSource for AdzunaFetcher {
    fn search(&self, keywords: &str, locations: &[String], max_days_old: u32) -> Vec<Listing> {
        let mut batches = Vec::new();

        // Queries run one at a time; the API rate-limits aggressively.
        for location in locations {
            match self.fetch_location(keywords, location, max_days_old) {
                Ok(listings) => {
                    info!(location = %location, count = listings.len(), "fetched listings");
                    batches.push(listings);
                }
                Err(e) => {
                    warn!(location = %location, error = %e, "search query failed, skipping location");
                }
            }
        }

        merge_unique(batches)
    }
}

/// Combine per-location batches into one candidate set, keeping the first
/// occurrence of each listing id.
fn merge_unique(batches: Vec<Vec<Listing>>) -> Vec<Listing> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut combined = Vec::new();

    for batch in batches {
        for listing in batch {
            if seen.insert(listing.id.clone()) {
                combined.push(listing);
            }
        }
    }

    combined
}

// --- Adzuna wire format ---

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<RawListing>,
}

#[derive(Debug, Deserialize)]
struct DisplayName {
    #[serde(default)]
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct RawListing {
    id: serde_json::Value,
    title: String,
    company: DisplayName,
    location: DisplayName,
    redirect_url: String,
    created: Option<String>,
    #[serde(default)]
    description: String,
    salary_min: Option<f64>,
    salary_max: Option<f64>,
}

impl RawListing {
    fn into_listing(self) -> Listing {
        // The API serves ids as strings in some feeds and bare numbers in
        // others; both normalize to the string key.
        let id = match self.id {
            serde_json::Value::String(id) => id,
            other => other.to_string(),
        };
        Listing {
            id,
            title: self.title,
            company: self.company.display_name,
            location: self.location.display_name,
            url: self.redirect_url,
            description: self.description,
            posted_at: self.created,
            salary_min: self.salary_min,
            salary_max: self.salary_max,
            first_seen: None,
            notified: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(id: &str) -> Listing {
        Listing {
            id: id.to_string(),
            title: format!("Job {id}"),
            company: "Acme".to_string(),
            location: "United States".to_string(),
            url: format!("https://example.com/{id}"),
            description: String::new(),
            posted_at: None,
            salary_min: None,
            salary_max: None,
            first_seen: None,
            notified: false,
        }
    }

    #[test]
    fn parse_search_response() {
        let raw = r#"{
            "results": [
                {
                    "id": "5049000001",
                    "title": "Software Engineer Intern",
                    "company": {"display_name": "Acme Corp"},
                    "location": {"display_name": "Austin, TX"},
                    "redirect_url": "https://example.com/5049000001",
                    "created": "2025-11-19T14:51:45Z",
                    "description": "Build things.",
                    "salary_min": 60000.0,
                    "salary_max": 80000.0
                }
            ]
        }"#;

        let response: SearchResponse = serde_json::from_str(raw).unwrap();
        let listings: Vec<Listing> = response
            .results
            .into_iter()
            .map(RawListing::into_listing)
            .collect();

        assert_eq!(listings.len(), 1);
        let listing = &listings[0];
        assert_eq!(listing.id, "5049000001");
        assert_eq!(listing.title, "Software Engineer Intern");
        assert_eq!(listing.company, "Acme Corp");
        assert_eq!(listing.location, "Austin, TX");
        assert_eq!(listing.url, "https://example.com/5049000001");
        assert_eq!(listing.posted_at.as_deref(), Some("2025-11-19T14:51:45Z"));
        assert_eq!(listing.salary_min, Some(60000.0));
        assert_eq!(listing.salary_max, Some(80000.0));
        assert!(!listing.notified);
        assert!(listing.first_seen.is_none());
    }

    #[test]
    fn numeric_id_normalized_to_string() {
        let raw = r#"{
            "id": 5049000002,
            "title": "Backend Intern",
            "company": {"display_name": "Acme"},
            "location": {"display_name": "Remote"},
            "redirect_url": "https://example.com/2"
        }"#;

        let parsed: RawListing = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.into_listing().id, "5049000002");
    }

    #[test]
    fn missing_optional_fields_default() {
        let raw = r#"{
            "id": "7",
            "title": "QA Intern",
            "company": {},
            "location": {"display_name": "Boston, MA"},
            "redirect_url": "https://example.com/7"
        }"#;

        let parsed: RawListing = serde_json::from_str(raw).unwrap();
        let listing = parsed.into_listing();
        assert_eq!(listing.company, "");
        assert_eq!(listing.description, "");
        assert!(listing.posted_at.is_none());
        assert!(listing.salary_min.is_none());
        assert!(listing.salary_max.is_none());
    }

    #[test]
    fn empty_body_yields_no_results() {
        let response: SearchResponse = serde_json::from_str("{}").unwrap();
        assert!(response.results.is_empty());
    }

    #[test]
    fn merge_unique_first_occurrence_wins() {
        let mut duplicate = listing("a");
        duplicate.title = "Same id, other location".to_string();

        let merged = merge_unique(vec![
            vec![listing("a"), listing("b")],
            vec![duplicate, listing("c")],
        ]);

        let ids: Vec<&str> = merged.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(merged[0].title, "Job a");
    }

    #[test]
    fn failed_locations_contribute_nothing() {
        let credentials = AdzunaCredentials {
            app_id: "app".to_string(),
            api_key: "key".to_string(),
        };
        // Port 9 (discard) refuses connections; every location query fails.
        let fetcher =
            AdzunaFetcher::with_base_url(&credentials, "http://127.0.0.1:9").unwrap();

        let locations = vec!["X".to_string(), "Y".to_string()];
        let listings = fetcher.search("engineer", &locations, 7);
        assert!(listings.is_empty());
    }
}
