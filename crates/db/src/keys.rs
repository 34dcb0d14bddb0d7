//! Key vocabulary for the single club table.
//!
//! Every stored item has a primary key `(pk, sk)` and up to two secondary
//! index keys. Sort keys that embed a timestamp use [`sort_timestamp`] so that
//! byte-wise string order equals chronological order.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};

const SORT_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Fixed-width UTC timestamp, e.g. `2026-03-01T09:00:00.000000Z`.
pub fn sort_timestamp(at: DateTime<Utc>) -> String {
    at.format(SORT_TIMESTAMP_FORMAT).to_string()
}

pub fn day_key(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemKey {
    pub pk: String,
    pub sk: String,
}

impl ItemKey {
    pub fn new(pk: impl Into<String>, sk: impl Into<String>) -> Self {
        Self { pk: pk.into(), sk: sk.into() }
    }

    pub fn is_valid(&self) -> bool {
        !self.pk.trim().is_empty() && !self.sk.trim().is_empty()
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.pk, self.sk)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IndexKey {
    pub pk: String,
    pub sk: String,
}

impl IndexKey {
    pub fn new(pk: impl Into<String>, sk: impl Into<String>) -> Self {
        Self { pk: pk.into(), sk: sk.into() }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexName {
    Primary,
    Gsi1,
    Gsi2,
}

impl IndexName {
    /// Column pair backing the index in the SQL store.
    pub(crate) fn columns(&self) -> (&'static str, &'static str) {
        match self {
            Self::Primary => ("pk", "sk"),
            Self::Gsi1 => ("gsi1pk", "gsi1sk"),
            Self::Gsi2 => ("gsi2pk", "gsi2sk"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SortCondition {
    Any,
    Equals(String),
    BeginsWith(String),
    /// Inclusive on both ends.
    Between(String, String),
    GreaterOrEqual(String),
}

impl SortCondition {
    pub fn matches(&self, sort_key: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Equals(value) => sort_key == value,
            Self::BeginsWith(prefix) => sort_key.starts_with(prefix.as_str()),
            Self::Between(low, high) => sort_key >= low.as_str() && sort_key <= high.as_str(),
            Self::GreaterOrEqual(value) => sort_key >= value.as_str(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Partition equality plus an optional sort-key condition on one index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexQuery {
    pub index: IndexName,
    pub partition: String,
    pub sort: SortCondition,
    pub order: SortOrder,
    pub limit: Option<usize>,
}

impl IndexQuery {
    pub fn primary(partition: impl Into<String>) -> Self {
        Self::on(IndexName::Primary, partition)
    }

    pub fn gsi1(partition: impl Into<String>) -> Self {
        Self::on(IndexName::Gsi1, partition)
    }

    pub fn gsi2(partition: impl Into<String>) -> Self {
        Self::on(IndexName::Gsi2, partition)
    }

    fn on(index: IndexName, partition: impl Into<String>) -> Self {
        Self {
            index,
            partition: partition.into(),
            sort: SortCondition::Any,
            order: SortOrder::Ascending,
            limit: None,
        }
    }

    pub fn sort(mut self, condition: SortCondition) -> Self {
        self.sort = condition;
        self
    }

    pub fn descending(mut self) -> Self {
        self.order = SortOrder::Descending;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}
