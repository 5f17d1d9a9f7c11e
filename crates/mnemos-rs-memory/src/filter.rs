//! Tenant-scoped search filters.
//!
//! A [`SearchFilter`] is an immutable expression tree. Stores translate it into
//! their own query language; [`SearchFilter::matches`] evaluates it in process.

use crate::model::{MemoryRecord, Metadata, MetadataValue};
use std::fmt;

/// Field a clause applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterField {
    UserId,
    SessionId,
    AgentName,
    /// A key inside the caller metadata map.
    Metadata(String),
}

impl FilterField {
    /// Payload path used by stores that nest metadata.
    pub fn path(&self) -> String {
        match self {
            Self::UserId => "user_id".to_string(),
            Self::SessionId => "session_id".to_string(),
            Self::AgentName => "agent_name".to_string(),
            Self::Metadata(key) => format!("metadata.{key}"),
        }
    }

    fn value_of(&self, record: &MemoryRecord) -> Option<MetadataValue> {
        match self {
            Self::UserId => Some(MetadataValue::String(record.user_id.clone())),
            Self::SessionId => record.session_id.clone().map(MetadataValue::String),
            Self::AgentName => record.agent_name.clone().map(MetadataValue::String),
            Self::Metadata(key) => record.metadata.get(key).cloned(),
        }
    }
}

impl fmt::Display for FilterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Numeric bounds for a range clause. Unset bounds are open.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RangeBounds {
    pub gt: Option<f64>,
    pub gte: Option<f64>,
    pub lt: Option<f64>,
    pub lte: Option<f64>,
}

impl RangeBounds {
    pub fn contains(&self, value: f64) -> bool {
        self.gt.is_none_or(|bound| value > bound)
            && self.gte.is_none_or(|bound| value >= bound)
            && self.lt.is_none_or(|bound| value < bound)
            && self.lte.is_none_or(|bound| value <= bound)
    }
}

/// Filter expression evaluated against stored records.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchFilter {
    /// Matches every record.
    All,
    /// Exact match on a field.
    Match {
        field: FilterField,
        value: MetadataValue,
    },
    /// Numeric range on a field.
    Range {
        field: FilterField,
        range: RangeBounds,
    },
    /// Every clause must match.
    And(Vec<SearchFilter>),
}

impl SearchFilter {
    pub fn matching(field: FilterField, value: impl Into<MetadataValue>) -> Self {
        Self::Match {
            field,
            value: value.into(),
        }
    }

    pub fn range(field: FilterField, range: RangeBounds) -> Self {
        Self::Range { field, range }
    }

    /// Conjunction of `self` and `other`, flattening nested `And`s and dropping `All`.
    pub fn and(self, other: SearchFilter) -> Self {
        let mut clauses = Vec::new();
        for filter in [self, other] {
            match filter {
                Self::All => {}
                Self::And(inner) => clauses.extend(inner),
                clause => clauses.push(clause),
            }
        }
        match clauses.len() {
            0 => Self::All,
            1 => clauses.remove(0),
            _ => Self::And(clauses),
        }
    }

    /// Evaluate against a record.
    pub fn matches(&self, record: &MemoryRecord) -> bool {
        match self {
            Self::All => true,
            Self::Match { field, value } => field.value_of(record).as_ref() == Some(value),
            Self::Range { field, range } => field
                .value_of(record)
                .and_then(|value| value.as_f64())
                .is_some_and(|value| range.contains(value)),
            Self::And(clauses) => clauses.iter().all(|clause| clause.matches(record)),
        }
    }

    /// Whether an exact `user_id` clause is part of the top-level conjunction.
    pub fn is_tenant_scoped(&self) -> bool {
        match self {
            Self::Match {
                field: FilterField::UserId,
                ..
            } => true,
            Self::And(clauses) => clauses.iter().any(Self::is_tenant_scoped),
            _ => false,
        }
    }

    /// Top-level clauses, treating a single clause as a one-element conjunction.
    pub fn clauses(&self) -> &[SearchFilter] {
        match self {
            Self::All => &[],
            Self::And(clauses) => clauses,
            clause => std::slice::from_ref(clause),
        }
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.trim().is_empty())
}

/// Build the conjunction of every supplied scope and metadata constraint.
///
/// Blank scope values impose nothing. Clauses are ordered user, session,
/// agent, then metadata keys in sorted order; no clauses yields
/// [`SearchFilter::All`].
pub fn build_filter(
    user_id: Option<&str>,
    session_id: Option<&str>,
    agent_name: Option<&str>,
    metadata: Option<&Metadata>,
) -> SearchFilter {
    let scopes = [
        (FilterField::UserId, user_id),
        (FilterField::SessionId, session_id),
        (FilterField::AgentName, agent_name),
    ];
    let scoped = scopes.into_iter().filter_map(|(field, value)| {
        present(value).map(|value| SearchFilter::matching(field, value))
    });
    let constraints = metadata.into_iter().flatten().map(|(key, value)| {
        SearchFilter::matching(FilterField::Metadata(key.clone()), value.clone())
    });
    scoped
        .chain(constraints)
        .fold(SearchFilter::All, SearchFilter::and)
}
