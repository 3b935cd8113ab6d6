// Relational operators over whole tables
//
// The transformation core never touches arrays directly when an operator
// exists for the job: it asks a `TabularEngine` to project, filter,
// deduplicate or join. `ArrowEngine` is the in-memory, single-threaded
// implementation; a distributed engine only has to honour the same
// contracts (in particular the ordering contract of `deduplicate`).

use arrow::array::RecordBatch;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

use crate::error::Result;

pub(crate) mod arrow_engine;

pub use arrow_engine::ArrowEngine;

/// A column taken from an input table, optionally under a new name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Select<'a> {
    pub source: &'a str,
    pub alias: &'a str,
}

impl<'a> Select<'a> {
    pub const fn col(name: &'a str) -> Self {
        Self {
            source: name,
            alias: name,
        }
    }

    pub const fn aliased(source: &'a str, alias: &'a str) -> Self {
        Self { source, alias }
    }
}

/// Row predicates understood by every engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate<'a> {
    /// String column equals the value exactly
    Equals { column: &'a str, value: &'a str },
    /// Column value is present
    NotNull(&'a str),
    /// String column is present and not only whitespace
    NotBlank(&'a str),
}

/// One component of a row ordering. Nulls always sort last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey<'a> {
    pub column: &'a str,
    pub descending: bool,
}

impl<'a> SortKey<'a> {
    pub const fn asc(column: &'a str) -> Self {
        Self {
            column,
            descending: false,
        }
    }

    pub const fn desc(column: &'a str) -> Self {
        Self {
            column,
            descending: true,
        }
    }
}

/// How string join keys are compared
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyMatch {
    /// Byte-for-byte equality
    #[default]
    Exact,
    /// Equality after trimming surrounding whitespace and lowercasing
    Normalized,
}

impl KeyMatch {
    pub fn normalize<'a>(&self, key: &'a str) -> Cow<'a, str> {
        match self {
            KeyMatch::Exact => Cow::Borrowed(key),
            KeyMatch::Normalized => Cow::Owned(key.trim().to_lowercase()),
        }
    }
}

impl std::str::FromStr for KeyMatch {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "exact" => Ok(KeyMatch::Exact),
            "normalized" | "normalised" => Ok(KeyMatch::Normalized),
            other => Err(format!(
                "unsupported key match mode: {}. Supported: exact, normalized",
                other
            )),
        }
    }
}

/// Inner equi-join on one string column from each side
#[derive(Debug, Clone, Copy)]
pub struct JoinOn<'a> {
    pub left: &'a str,
    pub right: &'a str,
    /// Columns of the right table appended to every output row
    pub carry: &'a [Select<'a>],
    pub matching: KeyMatch,
}

/// Capability interface of the tabular-compute collaborator.
///
/// Every operator is a pure function of its inputs. Implementations may
/// reorder rows freely except where a contract says otherwise.
pub trait TabularEngine: Send + Sync {
    /// Keep exactly `columns`, in order, renamed to their aliases.
    fn project(&self, table: &RecordBatch, columns: &[Select<'_>]) -> Result<RecordBatch>;

    /// Keep the rows satisfying `predicate`, preserving their order.
    fn filter(&self, table: &RecordBatch, predicate: &Predicate<'_>) -> Result<RecordBatch>;

    /// Keep one row per distinct non-null `key`.
    ///
    /// Rows are first put in a total order: `order`, then every column of
    /// the table ascending. The first row of each key in that order wins, so
    /// the result does not depend on input row order unless two rows are
    /// identical in every column.
    fn deduplicate(
        &self,
        table: &RecordBatch,
        key: &[&str],
        order: &[SortKey<'_>],
    ) -> Result<RecordBatch>;

    /// Inner join: one output row per matching (left, right) pair, in left
    /// row order. Left rows with a null or unmatched key are dropped.
    fn inner_join(
        &self,
        left: &RecordBatch,
        right: &RecordBatch,
        on: &JoinOn<'_>,
    ) -> Result<RecordBatch>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_match_from_str() {
        assert_eq!("exact".parse::<KeyMatch>().unwrap(), KeyMatch::Exact);
        assert_eq!(
            "Normalized".parse::<KeyMatch>().unwrap(),
            KeyMatch::Normalized
        );
        assert!("fuzzy".parse::<KeyMatch>().is_err());
    }

    #[test]
    fn normalized_keys_fold_case_and_trim() {
        assert_eq!(KeyMatch::Normalized.normalize("  Hey Jude "), "hey jude");
        assert_eq!(KeyMatch::Exact.normalize("  Hey Jude "), "  Hey Jude ");
    }
}
