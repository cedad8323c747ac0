use crate::errors::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PostStatus {
    Open,
    ClosingSoon,
    Closed,
    UnderReview,
    Hidden,
}

impl PostStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::ClosingSoon => "CLOSING_SOON",
            Self::Closed => "CLOSED",
            Self::UnderReview => "UNDER_REVIEW",
            Self::Hidden => "HIDDEN",
        }
    }
}

impl FromStr for PostStatus {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "OPEN" => Ok(Self::Open),
            "CLOSING_SOON" => Ok(Self::ClosingSoon),
            "CLOSED" => Ok(Self::Closed),
            "UNDER_REVIEW" => Ok(Self::UnderReview),
            "HIDDEN" => Ok(Self::Hidden),
            other => Err(AppError::Internal(format!("Unknown post status '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub avatar_url: Option<String>,
    pub website: Option<String>,
    pub legal_business_name: Option<String>,
    pub phone_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub company_id: String,
    pub title: String,
    pub description: String,
    pub reward: i64,
    pub status: PostStatus,
    pub created_at: DateTime<Utc>,
}

/// A post as delivered to the feed, with its owning company attached by the query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostWithCompany {
    #[serde(flatten)]
    pub post: Post,
    pub company: Option<CompanyProfile>,
}

impl PostWithCompany {
    pub fn id(&self) -> &str {
        &self.post.id
    }

    pub fn value_of(&self, column: Column) -> ColumnValue {
        match column {
            Column::Id => ColumnValue::Text(self.post.id.clone()),
            Column::CompanyId => ColumnValue::Text(self.post.company_id.clone()),
            Column::CreatedAt => ColumnValue::Timestamp(self.post.created_at),
            Column::Reward => ColumnValue::Integer(self.post.reward),
            Column::Status => ColumnValue::Text(self.post.status.as_str().to_string()),
        }
    }
}

/// Every column a predicate may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Id,
    CompanyId,
    CreatedAt,
    Reward,
    Status,
}

impl Column {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::CompanyId => "company_id",
            Self::CreatedAt => "created_at",
            Self::Reward => "reward",
            Self::Status => "status",
        }
    }
}

/// The closed set of columns a feed can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortColumn {
    CreatedAt,
    Reward,
    Status,
}

impl SortColumn {
    pub fn column(self) -> Column {
        match self {
            Self::CreatedAt => Column::CreatedAt,
            Self::Reward => Column::Reward,
            Self::Status => Column::Status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ColumnValue {
    Timestamp(DateTime<Utc>),
    Integer(i64),
    Text(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortKey {
    pub column: SortColumn,
    pub ascending: bool,
}

impl SortKey {
    pub fn asc(column: SortColumn) -> Self {
        Self {
            column,
            ascending: true,
        }
    }

    pub fn desc(column: SortColumn) -> Self {
        Self {
            column,
            ascending: false,
        }
    }
}

/// Ordered, non-empty list of sort keys with unique columns. The first key is primary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<SortKey>", into = "Vec<SortKey>")]
pub struct SortSpec {
    keys: Vec<SortKey>,
}

impl SortSpec {
    pub fn new(keys: Vec<SortKey>) -> Result<Self, AppError> {
        if keys.is_empty() {
            return Err(AppError::InvalidSort("sort order needs at least one column".to_string()));
        }
        let mut seen = BTreeSet::new();
        for key in &keys {
            if !seen.insert(key.column) {
                return Err(AppError::InvalidSort(format!(
                    "column '{}' appears more than once",
                    key.column.column().as_str()
                )));
            }
        }
        Ok(Self { keys })
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    pub fn primary(&self) -> SortKey {
        self.keys[0]
    }
}

impl TryFrom<Vec<SortKey>> for SortSpec {
    type Error = AppError;

    fn try_from(keys: Vec<SortKey>) -> Result<Self, Self::Error> {
        Self::new(keys)
    }
}

impl From<SortSpec> for Vec<SortKey> {
    fn from(spec: SortSpec) -> Self {
        spec.keys
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CreatedWithin {
    #[serde(rename = "24h")]
    Last24h,
    #[serde(rename = "7d")]
    Last7d,
    #[serde(rename = "30d")]
    Last30d,
    #[serde(rename = "all")]
    #[default]
    All,
}

pub const DEFAULT_MIN_REWARD: i64 = 0;
pub const UNBOUNDED_MAX_REWARD: i64 = i64::MAX;

/// Active feed predicate. Replaced wholesale, never patched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterSpec {
    pub min_reward: i64,
    pub max_reward: i64,
    pub statuses: BTreeSet<PostStatus>,
    pub created_within: CreatedWithin,
    pub company_id: Option<String>,
}

impl Default for FilterSpec {
    fn default() -> Self {
        Self {
            min_reward: DEFAULT_MIN_REWARD,
            max_reward: UNBOUNDED_MAX_REWARD,
            statuses: BTreeSet::new(),
            created_within: CreatedWithin::All,
            company_id: None,
        }
    }
}

/// One bounded page as returned by the fetcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub items: Vec<PostWithCompany>,
    pub reached_end: bool,
}

