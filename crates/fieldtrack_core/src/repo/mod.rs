//! Persistence layer: repository contracts and SQLite implementations.
//!
//! # Responsibility
//! - Keep SQL details inside the persistence boundary.
//! - Provide a small predicate type shared by query builders.

pub mod object_repo;
pub mod org_repo;
pub mod task_repo;

use rusqlite::types::Value;

/// One composable WHERE fragment with its positional bind values.
///
/// Fragments are assembled into a conjunction by query builders; every `?`
/// placeholder in `clause` consumes one entry of `binds` in order.
#[derive(Debug, Clone)]
pub struct SqlPredicate {
    pub clause: String,
    pub binds: Vec<Value>,
}

impl SqlPredicate {
    pub fn new(clause: impl Into<String>, binds: Vec<Value>) -> Self {
        Self {
            clause: clause.into(),
            binds,
        }
    }

    /// Joins predicates into one `AND` conjunction.
    ///
    /// An empty slice yields the always-true predicate.
    pub fn conjunction(predicates: &[SqlPredicate]) -> SqlPredicate {
        if predicates.is_empty() {
            return SqlPredicate::new("1 = 1", Vec::new());
        }

        let clause = predicates
            .iter()
            .map(|pred| format!("({})", pred.clause))
            .collect::<Vec<_>>()
            .join(" AND ");
        let binds = predicates
            .iter()
            .flat_map(|pred| pred.binds.iter().cloned())
            .collect();
        SqlPredicate { clause, binds }
    }
}

/// Builds an `IN (?, ?, ...)` placeholder list for `values.len()` binds.
pub(crate) fn placeholders(count: usize) -> String {
    let mut out = String::new();
    for index in 0..count {
        if index > 0 {
            out.push_str(", ");
        }
        out.push('?');
    }
    out
}
