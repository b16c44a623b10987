//! Typed filter parameters parsed once at the request boundary.
//!
//! # Responsibility
//! - Turn a string-keyed multi-value parameter map into `TaskFilterParams`.
//! - Parse composite `eng_<id>` / `dep_<id>` assignee tokens.
//! - Serialize resolved filter state back for link construction.
//!
//! # Invariants
//! - Malformed composite tokens are dropped silently, never an error.
//! - `applied_filters_count` ignores paging/sort/toggle parameters and
//!   counts a completion-date pair as one filter.

use crate::model::{ObjectId, Priority, TagId};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

static ASSIGNEE_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(eng|dep)_(\d+)$").expect("valid assignee token regex"));

/// One entry of the combined engineer/department filter field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssigneeToken {
    /// Matches tasks assigned to this engineer.
    Engineer(i64),
    /// Matches tasks whose engineers belong to this department, or tasks
    /// directly assigned to it.
    Department(i64),
}

impl AssigneeToken {
    /// Parses one composite token. Returns `None` for malformed input.
    pub fn parse(value: &str) -> Option<Self> {
        let captures = ASSIGNEE_TOKEN_RE.captures(value.trim())?;
        let id: i64 = captures.get(2)?.as_str().parse().ok()?;
        match captures.get(1)?.as_str() {
            "eng" => Some(Self::Engineer(id)),
            "dep" => Some(Self::Department(id)),
            _ => None,
        }
    }

    /// Renders the token back into its wire form.
    pub fn to_token(self) -> String {
        match self {
            Self::Engineer(id) => format!("eng_{id}"),
            Self::Department(id) => format!("dep_{id}"),
        }
    }
}

/// Requested sort direction over `(completion_time, create_time)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }
}

/// Typed task filter state.
///
/// Built once per request from the raw multi-value parameter map; list
/// parameters accept repeated keys and comma-separated values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFilterParams {
    /// Case-insensitive substring match over header OR text.
    pub search: Option<String>,
    pub tags: Vec<TagId>,
    pub assignees: Vec<AssigneeToken>,
    pub priority: Option<Priority>,
    pub objects_set: Vec<ObjectId>,
    pub completion_time_after: Option<NaiveDate>,
    pub completion_time_before: Option<NaiveDate>,
    pub sort_order: SortOrder,
    pub show_my_tasks_only: bool,
    pub show_active_task: bool,
    pub show_done_task: bool,
}

impl Default for TaskFilterParams {
    fn default() -> Self {
        Self {
            search: None,
            tags: Vec::new(),
            assignees: Vec::new(),
            priority: None,
            objects_set: Vec::new(),
            completion_time_after: None,
            completion_time_before: None,
            sort_order: SortOrder::Desc,
            show_my_tasks_only: false,
            show_active_task: true,
            show_done_task: false,
        }
    }
}

impl TaskFilterParams {
    /// Builds params from a multi-value pair list (repeated keys allowed).
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        let mut params = Self::default();

        for (key, value) in pairs {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key.as_str() {
                "search" => params.search = Some(value.to_string()),
                "tags" => params.tags.extend(parse_id_list(value)),
                "engineers" => params
                    .assignees
                    .extend(value.split(',').filter_map(AssigneeToken::parse)),
                "priority" => params.priority = Priority::parse(value),
                "objects_set" => params.objects_set.extend(parse_id_list(value)),
                "completion_time_after" => params.completion_time_after = parse_date(value),
                "completion_time_before" => params.completion_time_before = parse_date(value),
                "sort_order" => {
                    if let Some(order) = SortOrder::parse(value) {
                        params.sort_order = order;
                    }
                }
                "show_my_tasks_only" => {
                    if let Some(flag) = parse_bool(value) {
                        params.show_my_tasks_only = flag;
                    }
                }
                "show_active_task" => {
                    if let Some(flag) = parse_bool(value) {
                        params.show_active_task = flag;
                    }
                }
                "show_done_task" => {
                    if let Some(flag) = parse_bool(value) {
                        params.show_done_task = flag;
                    }
                }
                // Paging keys and unknown parameters are not filter state.
                _ => {}
            }
        }

        params.tags.sort_unstable();
        params.tags.dedup();
        params.objects_set.sort_unstable();
        params.objects_set.dedup();
        params
    }

    /// Number of applied filter facets.
    ///
    /// Paging, sort order and the display toggles are excluded; a
    /// completion-date pair counts once.
    pub fn applied_filters_count(&self) -> usize {
        let mut count = 0;
        if self.search.is_some() {
            count += 1;
        }
        if !self.tags.is_empty() {
            count += 1;
        }
        if !self.assignees.is_empty() {
            count += 1;
        }
        if self.priority.is_some() {
            count += 1;
        }
        if !self.objects_set.is_empty() {
            count += 1;
        }
        if self.completion_time_after.is_some() || self.completion_time_before.is_some() {
            count += 1;
        }
        count
    }

    /// Whether every field still holds its default.
    ///
    /// Stricter than `applied_filters_count() == 0`: the sort order and
    /// status toggles change the rendered page even though they are not
    /// counted as filters, so only fully-default requests may share one
    /// cache entry per (actor, page).
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    /// Serializes the resolved filter/sort state for link construction.
    ///
    /// The page number is intentionally absent so pagination links can
    /// append their own.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(search) = &self.search {
            pairs.push(("search".to_string(), search.clone()));
        }
        for tag in &self.tags {
            pairs.push(("tags".to_string(), tag.to_string()));
        }
        if !self.assignees.is_empty() {
            let tokens = self
                .assignees
                .iter()
                .map(|token| token.to_token())
                .collect::<Vec<_>>()
                .join(",");
            pairs.push(("engineers".to_string(), tokens));
        }
        if let Some(priority) = self.priority {
            pairs.push(("priority".to_string(), priority.as_db().to_string()));
        }
        for object_id in &self.objects_set {
            pairs.push(("objects_set".to_string(), object_id.to_string()));
        }
        if let Some(after) = self.completion_time_after {
            pairs.push(("completion_time_after".to_string(), after.to_string()));
        }
        if let Some(before) = self.completion_time_before {
            pairs.push(("completion_time_before".to_string(), before.to_string()));
        }
        pairs.push(("sort_order".to_string(), self.sort_order.as_str().to_string()));
        pairs.push((
            "show_my_tasks_only".to_string(),
            bool_str(self.show_my_tasks_only).to_string(),
        ));
        pairs.push((
            "show_active_task".to_string(),
            bool_str(self.show_active_task).to_string(),
        ));
        pairs.push((
            "show_done_task".to_string(),
            bool_str(self.show_done_task).to_string(),
        ));
        pairs
    }
}

fn parse_id_list(value: &str) -> Vec<i64> {
    value
        .split(',')
        .filter_map(|part| part.trim().parse::<i64>().ok())
        .collect()
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn bool_str(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

#[cfg(test)]
mod tests {
    use super::{AssigneeToken, SortOrder, TaskFilterParams};
    use chrono::NaiveDate;

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn token_parsing_accepts_eng_and_dep_forms() {
        assert_eq!(AssigneeToken::parse("eng_3"), Some(AssigneeToken::Engineer(3)));
        assert_eq!(
            AssigneeToken::parse("dep_12"),
            Some(AssigneeToken::Department(12))
        );
    }

    #[test]
    fn malformed_tokens_are_dropped_silently() {
        for bad in ["eng_", "dep_x", "eng_3_4", "manager_1", "eng-3", ""] {
            assert_eq!(AssigneeToken::parse(bad), None, "token `{bad}`");
        }

        let params = TaskFilterParams::from_pairs(&pairs(&[("engineers", "eng_3,bogus,dep_1,_9")]));
        assert_eq!(
            params.assignees,
            vec![AssigneeToken::Engineer(3), AssigneeToken::Department(1)]
        );
    }

    #[test]
    fn defaults_match_contract() {
        let params = TaskFilterParams::from_pairs(&[]);
        assert_eq!(params.sort_order, SortOrder::Desc);
        assert!(!params.show_my_tasks_only);
        assert!(params.show_active_task);
        assert!(!params.show_done_task);
        assert!(params.is_default());
    }

    #[test]
    fn applied_filters_count_treats_date_pair_as_one() {
        let params = TaskFilterParams::from_pairs(&pairs(&[
            ("search", "router"),
            ("completion_time_after", "2026-01-01"),
            ("completion_time_before", "2026-01-31"),
            ("sort_order", "asc"),
            ("show_done_task", "true"),
            ("page", "3"),
        ]));
        assert_eq!(params.applied_filters_count(), 2);

        let single_bound = TaskFilterParams::from_pairs(&pairs(&[(
            "completion_time_after",
            "2026-01-01",
        )]));
        assert_eq!(single_bound.applied_filters_count(), 1);
    }

    #[test]
    fn sort_and_toggles_break_default_state_without_counting() {
        let params = TaskFilterParams::from_pairs(&pairs(&[("sort_order", "asc")]));
        assert_eq!(params.applied_filters_count(), 0);
        assert!(!params.is_default());
    }

    #[test]
    fn query_pairs_round_trip_preserves_filter_state() {
        let params = TaskFilterParams::from_pairs(&pairs(&[
            ("search", "fiber"),
            ("tags", "5"),
            ("tags", "2"),
            ("engineers", "eng_3,dep_1"),
            ("completion_time_after", "2026-02-01"),
        ]));
        let rebuilt = TaskFilterParams::from_pairs(&params.to_query_pairs());
        assert_eq!(rebuilt, params);
        assert_eq!(
            rebuilt.completion_time_after,
            NaiveDate::from_ymd_opt(2026, 2, 1)
        );
    }
}
