//! Series metadata: one entry per distinct timeseries key, with user
//! attributes and the last update time.

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use crate::core::{DbError, Result};
use super::model::{TimeseriesKey, TimeseriesMetaOptions};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeseriesMeta {
    pub key: TimeseriesKey,
    pub attributes: BTreeMap<String, String>,
    pub update_time_in_us: i64,
}

impl TimeseriesMeta {
    pub fn new(key: TimeseriesKey) -> Self {
        Self {
            key,
            attributes: BTreeMap::new(),
            update_time_in_us: 0,
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SingleOperator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterEqual,
    LessThan,
    LessEqual,
    Prefix,
}

impl SingleOperator {
    fn matches_str(&self, actual: &str, expected: &str) -> bool {
        match self {
            Self::Equal => actual == expected,
            Self::NotEqual => actual != expected,
            Self::GreaterThan => actual > expected,
            Self::GreaterEqual => actual >= expected,
            Self::LessThan => actual < expected,
            Self::LessEqual => actual <= expected,
            Self::Prefix => actual.starts_with(expected),
        }
    }

    fn matches_time(&self, actual: i64, expected: i64) -> Result<bool> {
        Ok(match self {
            Self::Equal => actual == expected,
            Self::NotEqual => actual != expected,
            Self::GreaterThan => actual > expected,
            Self::GreaterEqual => actual >= expected,
            Self::LessThan => actual < expected,
            Self::LessEqual => actual <= expected,
            Self::Prefix => {
                return Err(DbError::invalid("Prefix is not supported on update time."));
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompositeOperator {
    And,
    Or,
    Not,
}

/// Filter for `query_timeseries_meta`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetaQueryCondition {
    Measurement {
        operator: SingleOperator,
        value: String,
    },
    DataSource {
        operator: SingleOperator,
        value: String,
    },
    Tag {
        operator: SingleOperator,
        name: String,
        value: String,
    },
    Attribute {
        operator: SingleOperator,
        name: String,
        value: String,
    },
    UpdateTime {
        operator: SingleOperator,
        time_in_us: i64,
    },
    Composite {
        operator: CompositeOperator,
        conditions: Vec<MetaQueryCondition>,
    },
}

impl MetaQueryCondition {
    pub fn measurement(operator: SingleOperator, value: impl Into<String>) -> Self {
        Self::Measurement {
            operator,
            value: value.into(),
        }
    }

    pub fn data_source(operator: SingleOperator, value: impl Into<String>) -> Self {
        Self::DataSource {
            operator,
            value: value.into(),
        }
    }

    pub fn tag(operator: SingleOperator, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Tag {
            operator,
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn attribute(
        operator: SingleOperator,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::Attribute {
            operator,
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn and(conditions: Vec<MetaQueryCondition>) -> Self {
        Self::Composite {
            operator: CompositeOperator::And,
            conditions,
        }
    }

    pub fn or(conditions: Vec<MetaQueryCondition>) -> Self {
        Self::Composite {
            operator: CompositeOperator::Or,
            conditions,
        }
    }

    pub fn not(condition: MetaQueryCondition) -> Self {
        Self::Composite {
            operator: CompositeOperator::Not,
            conditions: vec![condition],
        }
    }

    pub fn matches(&self, meta: &TimeseriesMeta) -> Result<bool> {
        match self {
            Self::Measurement { operator, value } => {
                Ok(operator.matches_str(&meta.key.measurement_name, value))
            }
            Self::DataSource { operator, value } => {
                Ok(operator.matches_str(&meta.key.data_source, value))
            }
            // a missing tag or attribute never matches
            Self::Tag {
                operator,
                name,
                value,
            } => Ok(meta
                .key
                .tags
                .get(name)
                .is_some_and(|actual| operator.matches_str(actual, value))),
            Self::Attribute {
                operator,
                name,
                value,
            } => Ok(meta
                .attributes
                .get(name)
                .is_some_and(|actual| operator.matches_str(actual, value))),
            Self::UpdateTime {
                operator,
                time_in_us,
            } => operator.matches_time(meta.update_time_in_us, *time_in_us),
            Self::Composite {
                operator,
                conditions,
            } => match operator {
                CompositeOperator::And => {
                    for c in conditions {
                        if !c.matches(meta)? {
                            return Ok(false);
                        }
                    }
                    Ok(true)
                }
                CompositeOperator::Or => {
                    for c in conditions {
                        if c.matches(meta)? {
                            return Ok(true);
                        }
                    }
                    Ok(false)
                }
                CompositeOperator::Not => {
                    let [inner] = conditions.as_slice() else {
                        return Err(DbError::invalid("NOT takes exactly one sub condition."));
                    };
                    Ok(!inner.matches(meta)?)
                }
            },
        }
    }
}

/// Meta entries of one timeseries table, ordered by key.
#[derive(Debug, Clone, Default)]
pub struct MetaStore {
    entries: BTreeMap<TimeseriesKey, TimeseriesMeta>,
}

impl MetaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registers a series seen by a data write; attributes are kept.
    pub fn touch(&mut self, key: &TimeseriesKey, now_us: i64) {
        self.entries
            .entry(key.clone())
            .and_modify(|m| m.update_time_in_us = now_us)
            .or_insert_with(|| TimeseriesMeta {
                key: key.clone(),
                attributes: BTreeMap::new(),
                update_time_in_us: now_us,
            });
    }

    /// Replaces the attributes of a series, creating the entry if needed.
    pub fn update(
        &mut self,
        meta: &TimeseriesMeta,
        options: &TimeseriesMetaOptions,
        now_us: i64,
    ) -> Result<()> {
        if !options.allow_update_attributes && !meta.attributes.is_empty() {
            return Err(DbError::invalid(
                "Updating attributes is not allowed for this timeseries table.",
            ));
        }
        let entry = self
            .entries
            .entry(meta.key.clone())
            .or_insert_with(|| TimeseriesMeta::new(meta.key.clone()));
        entry.attributes = meta.attributes.clone();
        entry.update_time_in_us = now_us;
        Ok(())
    }

    pub fn delete(&mut self, key: &TimeseriesKey) -> Result<()> {
        self.entries
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| DbError::NotFound("Timeseries meta does not exist.".into()))
    }

    /// Live entries matching `condition`, in key order, starting after
    /// `offset` matches; returns the offset to continue from when cut.
    pub fn query(
        &self,
        condition: Option<&MetaQueryCondition>,
        offset: usize,
        limit: usize,
        options: &TimeseriesMetaOptions,
        now_us: i64,
    ) -> Result<(Vec<TimeseriesMeta>, Option<usize>)> {
        let mut found = Vec::new();
        let mut matched = 0usize;
        for meta in self.entries.values() {
            if is_expired(meta, options, now_us) {
                continue;
            }
            if let Some(condition) = condition
                && !condition.matches(meta)?
            {
                continue;
            }
            matched += 1;
            if matched <= offset {
                continue;
            }
            if found.len() == limit {
                return Ok((found, Some(matched - 1)));
            }
            found.push(meta.clone());
        }
        Ok((found, None))
    }
}

fn is_expired(meta: &TimeseriesMeta, options: &TimeseriesMetaOptions, now_us: i64) -> bool {
    options.meta_time_to_live >= 0
        && meta
            .update_time_in_us
            .saturating_add(options.meta_time_to_live.saturating_mul(1_000_000))
            < now_us
}
