use crate::cursor::Cursor;
use crate::models::{PostWithCompany, SortSpec};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetchKind {
    Restart,
    Continue,
}

impl FetchKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Restart => "restart",
            Self::Continue => "continue",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Reconciled {
    pub items: Vec<PostWithCompany>,
    pub cursor: Option<Cursor>,
    pub appended: usize,
    pub duplicates: usize,
}

/// Merges a fetched page into the collection: a restart replaces, a continue appends by unseen id.
pub fn reconcile(
    kind: FetchKind,
    previous: Vec<PostWithCompany>,
    previous_cursor: Option<Cursor>,
    fetched: Vec<PostWithCompany>,
    sort: &SortSpec,
) -> Reconciled {
    let cursor = match fetched.last() {
        Some(last) => Some(Cursor::from_item(last, sort)),
        None => match kind {
            FetchKind::Restart => None,
            FetchKind::Continue => previous_cursor,
        },
    };

    let mut items = match kind {
        FetchKind::Restart => Vec::with_capacity(fetched.len()),
        FetchKind::Continue => previous,
    };
    let mut seen: HashSet<String> = items.iter().map(|item| item.id().to_string()).collect();

    let fetched_count = fetched.len();
    let before = items.len();
    for item in fetched {
        if seen.insert(item.id().to_string()) {
            items.push(item);
        }
    }
    let appended = items.len() - before;
    let duplicates = fetched_count - appended;

    Reconciled {
        items,
        cursor,
        appended,
        duplicates,
    }
}
