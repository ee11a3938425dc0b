use anyhow::Result;

use crate::config::SearchConfig;
use crate::fetcher::JobSource;
use crate::models::Listing;
use crate::notifier::Notifier;
use crate::store::JobStore;

/// Outcome of one tracking run.
#[derive(Debug)]
pub struct RunSummary {
    /// Candidates returned by the source, after cross-location dedup.
    pub fetched: usize,
    /// Listings inserted this run.
    pub new: usize,
    /// Listings ever tracked.
    pub total: u64,
    /// Digest delivery outcome; None when nothing was sent (no new listings,
    /// or dry run).
    pub notified: Option<bool>,
}

/// Orchestrates fetch, filter-new, persist, notify, mark-notified.
pub struct Tracker<'a> {
    source: &'a dyn JobSource,
    store: &'a dyn JobStore,
    notifier: &'a dyn Notifier,
    search: &'a SearchConfig,
}

impl<'a> Tracker<'a> {
    pub fn new(
        source: &'a dyn JobSource,
        store: &'a dyn JobStore,
        notifier: &'a dyn Notifier,
        search: &'a SearchConfig,
    ) -> Self {
        Self {
            source,
            store,
            notifier,
            search,
        }
    }

    /// Execute one run. In dry-run mode new listings are still persisted but
    /// the notifier is never invoked and nothing is marked notified.
    pub fn run(&self, dry_run: bool) -> Result<RunSummary> {
        let candidates = self.source.search(
            &self.search.keywords,
            &self.search.locations,
            self.search.max_days_old,
        );

        let mut new_listings: Vec<Listing> = Vec::new();
        for candidate in &candidates {
            if self.store.exists(&candidate.id)? {
                continue;
            }
            self.store.insert(candidate)?;
            new_listings.push(candidate.clone());
        }

        let mut notified = None;
        if !new_listings.is_empty() && !dry_run {
            // One digest for the whole batch, never per listing.
            let sent = self.notifier.send(&new_listings);
            if sent {
                for listing in &new_listings {
                    self.store.mark_notified(&listing.id)?;
                }
            }
            // On failure the batch stays persisted and unnotified. The next
            // run will not re-offer these ids (they are no longer new), so
            // the digest for them is never retried.
            notified = Some(sent);
        }

        Ok(RunSummary {
            fetched: candidates.len(),
            new: new_listings.len(),
            total: self.store.count()?,
            notified,
        })
    }
}
