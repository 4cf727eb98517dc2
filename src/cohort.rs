use std::collections::{BTreeMap, BTreeSet};

use tracing::info;

use crate::config::PeriodSelector;
use crate::error::{CubeError, Result};
use crate::filename::TileRecord;

/// Ordered, deduplicated labels of one classification dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryAxis {
    pub labels: Vec<String>,
}

impl CategoryAxis {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// The tiles of one period, indexed by (gender, age).
#[derive(Debug, Clone)]
pub struct Cohort {
    pub year: String,
    /// Every distinct year observed before filtering, ascending.
    pub available_years: Vec<String>,
    pub records: Vec<TileRecord>,
    pub genders: CategoryAxis,
    pub ages: CategoryAxis,
    pub tiles: BTreeMap<(String, String), String>,
}

impl Cohort {
    pub fn tile(&self, gender: &str, age: &str) -> Option<&str> {
        self.tiles
            .get(&(gender.to_string(), age.to_string()))
            .map(String::as_str)
    }

    /// Numeric ids of the age axis, in axis order.
    pub fn age_ids(&self) -> Vec<i16> {
        self.ages
            .labels
            .iter()
            .map(|a| a.parse().unwrap_or(0))
            .collect()
    }
}

pub fn select_cohort(records: &[TileRecord], selector: &PeriodSelector) -> Result<Cohort> {
    let available_years: Vec<String> = records
        .iter()
        .map(|r| r.year.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let year = match selector {
        PeriodSelector::Explicit(year) => year.clone(),
        // 4桁固定なので辞書順の最大値が最新年
        PeriodSelector::Latest => available_years.last().cloned().unwrap_or_default(),
    };

    let selected: Vec<TileRecord> = records.iter().filter(|r| r.year == year).cloned().collect();
    if selected.is_empty() {
        return Err(CubeError::NoRecordsForPeriod {
            period: year,
            available: available_years,
        });
    }
    info!("Using year={}, files={}", year, selected.len());

    let genders: Vec<String> = selected
        .iter()
        .map(|r| r.gender.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    // 年齢は数値順で並べる（"5" と "10" のような桁違いにも備える）
    let mut ages: Vec<String> = selected
        .iter()
        .map(|r| r.age.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    ages.sort_by_key(|a| (a.parse::<u32>().unwrap_or(u32::MAX), a.clone()));

    info!("Genders={:?}", genders);
    info!("Ages={:?}", ages);

    // 同じ組み合わせが複数ある場合はファイル名順で最後のものを採用する
    let tiles = selected
        .iter()
        .map(|r| ((r.gender.clone(), r.age.clone()), r.filename.clone()))
        .collect();

    Ok(Cohort {
        year,
        available_years,
        records: selected,
        genders: CategoryAxis { labels: genders },
        ages: CategoryAxis { labels: ages },
        tiles,
    })
}
