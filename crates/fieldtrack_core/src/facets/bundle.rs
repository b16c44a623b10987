//! Cached facet bundles per actor and list page.
//!
//! # Responsibility
//! - Assemble the facet collections one list page needs into a single
//!   serializable bundle.
//! - Serve bundles from the facet cache namespaces; rebuild on miss.
//!
//! # Invariants
//! - Bundles are cached per `(page, actor)` because visibility scopes the
//!   tag facet; two actors may see different tag sets.
//! - An unknown page name is a configuration error and fails fast.

use crate::cache::{CacheCoordinator, CacheNamespace};
use crate::db::DbError;
use crate::facets::tree::{build_engineer_forest, build_forest, EngineerLeaf, Node, TreeRecord};
use crate::model::ActorId;
use crate::visibility::{resolve_task_visibility, task_visibility_predicate, VisibilityError};
use log::debug;
use rusqlite::{params_from_iter, Connection};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

const FACET_TTL: Duration = Duration::from_secs(600);

pub type FacetResult<T> = Result<T, FacetError>;

/// Errors from facet assembly.
#[derive(Debug)]
pub enum FacetError {
    Db(DbError),
    Visibility(VisibilityError),
    /// Page name is not one of the known list pages.
    UnknownPage(String),
}

impl Display for FacetError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Visibility(err) => write!(f, "{err}"),
            Self::UnknownPage(page) => write!(f, "unknown facet page: {page}"),
        }
    }
}

impl Error for FacetError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Visibility(err) => Some(err),
            Self::UnknownPage(_) => None,
        }
    }
}

impl From<DbError> for FacetError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for FacetError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<VisibilityError> for FacetError {
    fn from(value: VisibilityError) -> Self {
        Self::Visibility(value)
    }
}

/// List page a facet bundle is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacetPage {
    Objects,
    Tasks,
}

impl FacetPage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Objects => "objects",
            Self::Tasks => "tasks",
        }
    }

    fn namespace(self) -> CacheNamespace {
        match self {
            Self::Objects => CacheNamespace::ObjectFilterFacets,
            Self::Tasks => CacheNamespace::TaskFilterFacets,
        }
    }
}

impl FromStr for FacetPage {
    type Err = FacetError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "objects" => Ok(Self::Objects),
            "tasks" => Ok(Self::Tasks),
            other => Err(FacetError::UnknownPage(other.to_string())),
        }
    }
}

/// Facet collections for one list page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetBundle {
    /// Flat tag facet, scoped by what the actor can see.
    pub tags: Vec<Node>,
    /// Object forest built from parent links.
    pub objects: Vec<Node>,
    /// Object-group facet; objects page only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<Node>>,
    /// Department-grouped engineer forest; tasks page only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engineers: Option<Vec<Node>>,
}

/// Returns the facet bundle for one page and actor, cached for ten minutes
/// under the page's facet namespace.
pub fn get_facets(
    conn: &Connection,
    cache: &CacheCoordinator,
    actor_id: ActorId,
    page: FacetPage,
) -> FacetResult<FacetBundle> {
    let namespace = page.namespace();
    let key = format!("filter_components:{}:{actor_id}", page.as_str());

    if let Some(bundle) = cache.get_json::<FacetBundle>(namespace, &key) {
        debug!(
            "event=facets_served module=facets status=hit page={} actor_id={actor_id}",
            page.as_str()
        );
        return Ok(bundle);
    }

    let bundle = build_bundle(conn, actor_id, page)?;
    cache.set_json(namespace, &key, &bundle, FACET_TTL);
    debug!(
        "event=facets_served module=facets status=rebuilt page={} actor_id={actor_id}",
        page.as_str()
    );
    Ok(bundle)
}

fn build_bundle(conn: &Connection, actor_id: ActorId, page: FacetPage) -> FacetResult<FacetBundle> {
    Ok(match page {
        FacetPage::Tasks => FacetBundle {
            tags: visible_task_tags(conn, actor_id)?,
            objects: object_forest(conn)?,
            groups: None,
            engineers: Some(engineer_forest(conn)?),
        },
        FacetPage::Objects => FacetBundle {
            tags: object_tags(conn)?,
            objects: object_forest(conn)?,
            groups: Some(group_facet(conn)?),
            engineers: None,
        },
    })
}

/// Tags attached to at least one task the actor can see.
fn visible_task_tags(conn: &Connection, actor_id: ActorId) -> FacetResult<Vec<Node>> {
    let visibility = resolve_task_visibility(conn, actor_id)?;
    let predicate = task_visibility_predicate(&visibility);
    let sql = format!(
        "SELECT DISTINCT tg.id, tg.name FROM tags tg
         INNER JOIN tasks_tags tt ON tt.tag_id = tg.id
         WHERE EXISTS(SELECT 1 FROM tasks t WHERE t.id = tt.task_id AND {})
         ORDER BY tg.name ASC;",
        predicate.clause
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(predicate.binds))?;
    let mut nodes = Vec::new();
    while let Some(row) = rows.next()? {
        let id: i64 = row.get(0)?;
        nodes.push(Node {
            id: id.to_string(),
            label: row.get(1)?,
            children: Vec::new(),
        });
    }
    Ok(nodes)
}

/// Tags attached to at least one object.
fn object_tags(conn: &Connection) -> FacetResult<Vec<Node>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT tg.id, tg.name FROM tags tg
         INNER JOIN objects_tags ot ON ot.tag_id = tg.id
         ORDER BY tg.name ASC;",
    )?;
    let mut rows = stmt.query([])?;
    let mut nodes = Vec::new();
    while let Some(row) = rows.next()? {
        let id: i64 = row.get(0)?;
        nodes.push(Node {
            id: id.to_string(),
            label: row.get(1)?,
            children: Vec::new(),
        });
    }
    Ok(nodes)
}

fn object_forest(conn: &Connection) -> FacetResult<Vec<Node>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, parent_id FROM objects ORDER BY parent_id IS NOT NULL, id ASC;",
    )?;
    let mut rows = stmt.query([])?;
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        records.push(TreeRecord {
            id: row.get(0)?,
            label: row.get(1)?,
            parent: row.get(2)?,
        });
    }
    Ok(build_forest(&records))
}

fn engineer_forest(conn: &Connection) -> FacetResult<Vec<Node>> {
    let mut stmt = conn.prepare(
        "SELECT e.id, e.first_name, e.second_name, d.id, d.name
         FROM engineers e
         LEFT JOIN departments d ON d.id = e.department_id
         ORDER BY d.id IS NULL, e.id ASC;",
    )?;
    let mut rows = stmt.query([])?;
    let mut leaves = Vec::new();
    while let Some(row) = rows.next()? {
        let first_name: String = row.get(1)?;
        let second_name: String = row.get(2)?;
        let department_id: Option<i64> = row.get(3)?;
        let department_name: Option<String> = row.get(4)?;
        leaves.push(EngineerLeaf {
            engineer_id: row.get(0)?,
            label: format!("{first_name} {second_name}").trim().to_string(),
            department: department_id.zip(department_name),
        });
    }
    Ok(build_engineer_forest(&leaves))
}

fn group_facet(conn: &Connection) -> FacetResult<Vec<Node>> {
    let mut stmt = conn.prepare("SELECT id, name FROM object_groups ORDER BY name ASC;")?;
    let mut rows = stmt.query([])?;
    let mut nodes = Vec::new();
    while let Some(row) = rows.next()? {
        let id: i64 = row.get(0)?;
        nodes.push(Node {
            id: id.to_string(),
            label: row.get(1)?,
            children: Vec::new(),
        });
    }
    Ok(nodes)
}
