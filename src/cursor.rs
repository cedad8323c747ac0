use crate::errors::{AppError, AppResult};
use crate::models::{Column, ColumnValue, PostWithCompany, SortColumn, SortSpec};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Position after the last delivered item, keyed on every column of the active sort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cursor {
    pub values: BTreeMap<SortColumn, ColumnValue>,
    pub last_id: String,
}

impl Cursor {
    pub fn from_item(item: &PostWithCompany, sort: &SortSpec) -> Self {
        let values = sort
            .keys()
            .iter()
            .map(|key| (key.column, item.value_of(key.column.column())))
            .collect();
        Self {
            values,
            last_id: item.id().to_string(),
        }
    }

    pub fn value(&self, column: SortColumn) -> Option<&ColumnValue> {
        self.values.get(&column)
    }

    /// Value for a keyset column, where `Column::Id` resolves to the last item id.
    pub fn key_value(&self, column: Column) -> Option<ColumnValue> {
        match column {
            Column::Id => Some(ColumnValue::Text(self.last_id.clone())),
            Column::CreatedAt => self.value(SortColumn::CreatedAt).cloned(),
            Column::Reward => self.value(SortColumn::Reward).cloned(),
            Column::Status => self.value(SortColumn::Status).cloned(),
            Column::CompanyId => None,
        }
    }

    pub fn covers(&self, sort: &SortSpec) -> bool {
        sort.keys().iter().all(|key| self.values.contains_key(&key.column))
    }

    pub fn encode(&self) -> AppResult<String> {
        let json = serde_json::to_string(self)?;
        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(json.as_bytes()))
    }

    pub fn decode(token: &str) -> AppResult<Self> {
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|error| AppError::InvalidCursor(format!("not base64: {}", error)))?;
        serde_json::from_slice(&bytes)
            .map_err(|error| AppError::InvalidCursor(format!("malformed cursor payload: {}", error)))
    }
}
