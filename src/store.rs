use crate::errors::{AppError, AppResult};
use crate::models::PostWithCompany;
use crate::query::FeedQuery;
use std::future::Future;
use std::pin::Pin;
use std::sync::RwLock;

pub type StoreFuture<'a> = Pin<Box<dyn Future<Output = AppResult<Vec<PostWithCompany>>> + Send + 'a>>;

/// Any backend able to run a filter + sort + limit query over the posts table.
pub trait PostStore: Send + Sync {
    fn name(&self) -> &'static str;

    fn query<'a>(&'a self, query: &'a FeedQuery) -> StoreFuture<'a>;
}

/// Store that evaluates queries against rows held in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: RwLock<Vec<PostWithCompany>>,
}

impl MemoryStore {
    pub fn new(rows: Vec<PostWithCompany>) -> Self {
        Self {
            rows: RwLock::new(rows),
        }
    }

    pub fn insert(&self, row: PostWithCompany) -> AppResult<()> {
        let mut rows = self
            .rows
            .write()
            .map_err(|_| AppError::Internal("memory store lock poisoned".to_string()))?;
        rows.retain(|existing| existing.id() != row.id());
        rows.push(row);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.read().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn select(&self, query: &FeedQuery) -> AppResult<Vec<PostWithCompany>> {
        let rows = self
            .rows
            .read()
            .map_err(|_| AppError::Internal("memory store lock poisoned".to_string()))?;
        let mut matched: Vec<PostWithCompany> = rows
            .iter()
            .filter(|row| query.predicate.matches(row))
            .cloned()
            .collect();
        matched.sort_by(|a, b| query.compare(a, b));
        matched.truncate(query.limit as usize);
        Ok(matched)
    }
}

impl PostStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn query<'a>(&'a self, query: &'a FeedQuery) -> StoreFuture<'a> {
        Box::pin(async move { self.select(query) })
    }
}
