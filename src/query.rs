use crate::cursor::Cursor;
use crate::errors::{AppError, AppResult};
use crate::models::{Column, ColumnValue, FilterSpec, PostWithCompany, SortSpec};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
        }
    }

    fn holds(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Gt => ordering == Ordering::Greater,
            Self::Gte => ordering != Ordering::Less,
            Self::Lt => ordering == Ordering::Less,
            Self::Lte => ordering != Ordering::Greater,
        }
    }
}

/// Backend-neutral predicate tree. An empty `And` is true, an empty `Or` is false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    Compare {
        column: Column,
        op: CompareOp,
        value: ColumnValue,
    },
    In {
        column: Column,
        values: Vec<ColumnValue>,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    pub fn compare(column: Column, op: CompareOp, value: ColumnValue) -> Self {
        Self::Compare { column, op, value }
    }

    pub fn matches(&self, item: &PostWithCompany) -> bool {
        match self {
            Self::Compare { column, op, value } => op.holds(item.value_of(*column).cmp(value)),
            Self::In { column, values } => {
                let actual = item.value_of(*column);
                values.iter().any(|candidate| *candidate == actual)
            }
            Self::And(parts) => parts.iter().all(|part| part.matches(item)),
            Self::Or(parts) => parts.iter().any(|part| part.matches(item)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortClause {
    pub column: Column,
    pub ascending: bool,
}

/// Final ordering key appended after the sort spec so rows never tie.
pub const ID_TIE_BREAK: SortClause = SortClause {
    column: Column::Id,
    ascending: true,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedQuery {
    pub predicate: Predicate,
    pub sort: Vec<SortClause>,
    pub limit: u32,
}

impl FeedQuery {
    pub fn compare(&self, a: &PostWithCompany, b: &PostWithCompany) -> Ordering {
        for clause in &self.sort {
            let ordering = a.value_of(clause.column).cmp(&b.value_of(clause.column));
            let ordering = if clause.ascending {
                ordering
            } else {
                ordering.reverse()
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

/// Builds the store query for one page. `now` anchors the recency window.
pub fn translate(
    filter: &FilterSpec,
    sort: &SortSpec,
    cursor: Option<&Cursor>,
    page_size: u32,
    now: DateTime<Utc>,
) -> AppResult<FeedQuery> {
    if page_size == 0 {
        return Err(AppError::Config("page size must be at least 1".to_string()));
    }
    filter.validate()?;

    let mut clauses = filter_clauses(filter, now);
    if let Some(cursor) = cursor {
        clauses.push(keyset_clause(sort, cursor)?);
    }

    Ok(FeedQuery {
        predicate: Predicate::And(clauses),
        sort: sort_clauses(sort),
        limit: page_size,
    })
}

fn filter_clauses(filter: &FilterSpec, now: DateTime<Utc>) -> Vec<Predicate> {
    let mut clauses = Vec::new();

    if filter.has_min_reward() {
        clauses.push(Predicate::compare(
            Column::Reward,
            CompareOp::Gte,
            ColumnValue::Integer(filter.min_reward),
        ));
    }
    if filter.has_max_reward() {
        clauses.push(Predicate::compare(
            Column::Reward,
            CompareOp::Lte,
            ColumnValue::Integer(filter.max_reward),
        ));
    }
    if !filter.statuses.is_empty() {
        clauses.push(Predicate::In {
            column: Column::Status,
            values: filter
                .statuses
                .iter()
                .map(|status| ColumnValue::Text(status.as_str().to_string()))
                .collect(),
        });
    }
    if let Some(cutoff) = filter.created_within.cutoff(now) {
        clauses.push(Predicate::compare(
            Column::CreatedAt,
            CompareOp::Gte,
            ColumnValue::Timestamp(cutoff),
        ));
    }
    if let Some(company_id) = &filter.company_id {
        clauses.push(Predicate::compare(
            Column::CompanyId,
            CompareOp::Eq,
            ColumnValue::Text(company_id.clone()),
        ));
    }

    clauses
}

pub fn sort_clauses(sort: &SortSpec) -> Vec<SortClause> {
    sort.keys()
        .iter()
        .map(|key| SortClause {
            column: key.column.column(),
            ascending: key.ascending,
        })
        .chain(std::iter::once(ID_TIE_BREAK))
        .collect()
}

/// Rows strictly after the cursor under `sort`:
/// `k1 > v1 OR (k1 = v1 AND k2 > v2) OR ... OR (k1 = v1 AND ... AND id > last_id)`,
/// with `<` in place of `>` for descending keys.
fn keyset_clause(sort: &SortSpec, cursor: &Cursor) -> AppResult<Predicate> {
    if !cursor.covers(sort) {
        return Err(AppError::InvalidCursor(
            "cursor does not carry a value for every sort column".to_string(),
        ));
    }

    let keys = sort_clauses(sort);
    let mut bound = Vec::with_capacity(keys.len());
    for key in &keys {
        let value = cursor.key_value(key.column).ok_or_else(|| {
            AppError::InvalidCursor(format!("cursor is missing column '{}'", key.column.as_str()))
        })?;
        bound.push((*key, value));
    }

    let branches = (0..bound.len())
        .map(|depth| {
            let mut parts: Vec<Predicate> = bound[..depth]
                .iter()
                .map(|(key, value)| Predicate::compare(key.column, CompareOp::Eq, value.clone()))
                .collect();
            let (key, value) = &bound[depth];
            let op = if key.ascending { CompareOp::Gt } else { CompareOp::Lt };
            parts.push(Predicate::compare(key.column, op, value.clone()));
            Predicate::And(parts)
        })
        .collect();

    Ok(Predicate::Or(branches))
}
