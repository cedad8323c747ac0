use crate::models::{SortColumn, SortKey, SortSpec};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sort orders offered by the feed's sort picker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SortPreset {
    #[default]
    Newest,
    Oldest,
    HighestReward,
    LowestReward,
    Status,
}

static PRESET_SPECS: Lazy<BTreeMap<SortPreset, SortSpec>> = Lazy::new(|| {
    SortPreset::all()
        .iter()
        .map(|preset| (*preset, build_spec(*preset)))
        .collect()
});

fn build_spec(preset: SortPreset) -> SortSpec {
    let keys = match preset {
        SortPreset::Newest => vec![SortKey::desc(SortColumn::CreatedAt)],
        SortPreset::Oldest => vec![SortKey::asc(SortColumn::CreatedAt)],
        SortPreset::HighestReward => vec![
            SortKey::desc(SortColumn::Reward),
            SortKey::desc(SortColumn::CreatedAt),
        ],
        SortPreset::LowestReward => vec![
            SortKey::asc(SortColumn::Reward),
            SortKey::desc(SortColumn::CreatedAt),
        ],
        SortPreset::Status => vec![
            SortKey::asc(SortColumn::Status),
            SortKey::desc(SortColumn::Reward),
            SortKey::desc(SortColumn::CreatedAt),
        ],
    };
    SortSpec::new(keys).expect("preset sort keys are unique")
}

impl SortPreset {
    pub fn all() -> &'static [SortPreset] {
        &[
            SortPreset::Newest,
            SortPreset::Oldest,
            SortPreset::HighestReward,
            SortPreset::LowestReward,
            SortPreset::Status,
        ]
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Newest => "Newest first",
            Self::Oldest => "Oldest first",
            Self::HighestReward => "Highest reward",
            Self::LowestReward => "Lowest reward",
            Self::Status => "By status",
        }
    }

    pub fn spec(self) -> SortSpec {
        PRESET_SPECS
            .get(&self)
            .cloned()
            .unwrap_or_else(|| build_spec(self))
    }

    /// Maps a spec back to the preset that produced it, if any.
    pub fn matching(spec: &SortSpec) -> Option<SortPreset> {
        PRESET_SPECS
            .iter()
            .find(|(_, candidate)| *candidate == spec)
            .map(|(preset, _)| *preset)
    }
}

impl Default for SortSpec {
    fn default() -> Self {
        SortPreset::default().spec()
    }
}
