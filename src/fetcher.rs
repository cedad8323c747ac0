use crate::errors::{AppError, AppResult};
use crate::models::Page;
use crate::query::FeedQuery;
use crate::store::PostStore;
use std::sync::Arc;

/// Runs exactly one query per call against the configured store.
#[derive(Clone)]
pub struct PageFetcher {
    store: Arc<dyn PostStore>,
}

impl PageFetcher {
    pub fn new(store: Arc<dyn PostStore>) -> Self {
        Self { store }
    }

    pub async fn fetch(&self, query: &FeedQuery) -> AppResult<Page> {
        let mut items = self.store.query(query).await.map_err(|error| {
            if error.is_retryable() {
                error
            } else {
                AppError::Store(error.to_string())
            }
        })?;

        let limit = query.limit as usize;
        if items.len() > limit {
            tracing::warn!(
                store = self.store.name(),
                returned = items.len(),
                limit,
                "store ignored the row limit; truncating page"
            );
            items.truncate(limit);
        }

        // A full page may still be the last one; the next call then comes back empty.
        let reached_end = items.len() < limit;
        tracing::debug!(
            store = self.store.name(),
            count = items.len(),
            reached_end,
            "fetched feed page"
        );

        Ok(Page { items, reached_end })
    }
}
