use fieldtrack_core::cache::{CacheCoordinator, MemoryCacheStore};
use fieldtrack_core::db::open_db_in_memory;
use fieldtrack_core::facets::{get_facets, FacetError, FacetPage};
use fieldtrack_core::repo::object_repo::{NewObject, ObjectRepository, SqliteObjectRepository};
use fieldtrack_core::repo::org_repo::{NewEngineer, OrgRepository, SqliteOrgRepository};
use fieldtrack_core::repo::task_repo::{NewTask, SqliteTaskRepository, TaskRepository};
use fieldtrack_core::service::org_actions;
use rusqlite::Connection;
use std::str::FromStr;
use std::sync::Arc;

fn cache() -> CacheCoordinator {
    CacheCoordinator::new(Arc::new(MemoryCacheStore::new()))
}

struct Fixture {
    boss: i64,
    site: i64,
    building: i64,
    floor: i64,
    outpost: i64,
}

fn seed(conn: &Connection) -> Fixture {
    let org = SqliteOrgRepository::new(conn);
    let boss = org.create_actor("boss", true).unwrap();
    let dept = org.create_department("network").unwrap();
    org.create_engineer(&NewEngineer {
        first_name: "Ada".to_string(),
        second_name: "Field".to_string(),
        actor_id: Some(boss.id),
        department_id: Some(dept.id),
        ..Default::default()
    })
    .unwrap();
    org.create_engineer(&NewEngineer {
        first_name: "Solo".to_string(),
        second_name: "Tech".to_string(),
        ..Default::default()
    })
    .unwrap();

    let objects = SqliteObjectRepository::new(conn);
    let site = objects
        .create_object(&NewObject {
            name: "site-a".to_string(),
            ..Default::default()
        })
        .unwrap();
    let building = objects
        .create_object(&NewObject {
            name: "building-1".to_string(),
            parent_id: Some(site.id),
            ..Default::default()
        })
        .unwrap();
    let floor = objects
        .create_object(&NewObject {
            name: "floor-2".to_string(),
            parent_id: Some(building.id),
            ..Default::default()
        })
        .unwrap();
    let outpost = objects
        .create_object(&NewObject {
            name: "outpost".to_string(),
            ..Default::default()
        })
        .unwrap();

    Fixture {
        boss: boss.id,
        site: site.id,
        building: building.id,
        floor: floor.id,
        outpost: outpost.id,
    }
}

#[test]
fn tasks_page_bundle_nests_objects_and_groups_engineers() {
    let conn = open_db_in_memory().unwrap();
    let cache = cache();
    let f = seed(&conn);

    let bundle = get_facets(&conn, &cache, f.boss, FacetPage::Tasks).unwrap();

    assert_eq!(bundle.objects.len(), 2);
    assert_eq!(bundle.objects[0].id, f.site.to_string());
    assert_eq!(bundle.objects[0].children[0].id, f.building.to_string());
    assert_eq!(
        bundle.objects[0].children[0].children[0].id,
        f.floor.to_string()
    );
    assert_eq!(bundle.objects[1].id, f.outpost.to_string());

    let engineers = bundle.engineers.expect("tasks page carries engineers");
    assert_eq!(engineers.len(), 2);
    assert!(engineers[0].id.starts_with("dep_"));
    assert_eq!(engineers[0].children.len(), 1);
    assert!(engineers[0].children[0].id.starts_with("eng_"));
    // The departmentless engineer trails as a flat leaf.
    assert!(engineers[1].id.starts_with("eng_"));
    assert!(engineers[1].children.is_empty());

    assert!(bundle.groups.is_none());
}

#[test]
fn tag_facet_is_scoped_to_visible_tasks() {
    let conn = open_db_in_memory().unwrap();
    let cache = cache();
    let org = SqliteOrgRepository::new(&conn);
    let alice = org.create_actor("alice", false).unwrap();
    let bob = org.create_actor("bob", false).unwrap();
    let seen = org.ensure_tag("seen").unwrap();
    let hidden = org.ensure_tag("hidden").unwrap();

    let tasks = SqliteTaskRepository::new(&conn);
    tasks
        .create_task(&NewTask {
            header: "alice task".to_string(),
            creator_id: alice.id,
            tag_ids: vec![seen.id],
            ..Default::default()
        })
        .unwrap();
    tasks
        .create_task(&NewTask {
            header: "bob task".to_string(),
            creator_id: bob.id,
            tag_ids: vec![hidden.id],
            ..Default::default()
        })
        .unwrap();

    let bundle = get_facets(&conn, &cache, alice.id, FacetPage::Tasks).unwrap();
    let tag_ids: Vec<&str> = bundle.tags.iter().map(|node| node.id.as_str()).collect();
    assert_eq!(tag_ids, vec![seen.id.to_string().as_str()]);
}

#[test]
fn bundle_is_cached_until_a_facet_entity_changes() {
    let conn = open_db_in_memory().unwrap();
    let cache = cache();
    let f = seed(&conn);

    let before = get_facets(&conn, &cache, f.boss, FacetPage::Tasks).unwrap();

    // A repository-level write without a bump serves the stale bundle.
    let objects = SqliteObjectRepository::new(&conn);
    objects
        .create_object(&NewObject {
            name: "annex".to_string(),
            ..Default::default()
        })
        .unwrap();
    let stale = get_facets(&conn, &cache, f.boss, FacetPage::Tasks).unwrap();
    assert_eq!(stale, before);

    // An engineer mutation bumps the task facet namespace.
    org_actions::create_engineer(
        &conn,
        &cache,
        &NewEngineer {
            first_name: "New".to_string(),
            second_name: "Hire".to_string(),
            ..Default::default()
        },
    )
    .unwrap();
    let fresh = get_facets(&conn, &cache, f.boss, FacetPage::Tasks).unwrap();
    assert_eq!(fresh.objects.len(), 3);
}

#[test]
fn objects_page_bundle_carries_groups_instead_of_engineers() {
    let conn = open_db_in_memory().unwrap();
    let cache = cache();
    let f = seed(&conn);

    let org = SqliteOrgRepository::new(&conn);
    org.create_object_group("datacenters").unwrap();

    let bundle = get_facets(&conn, &cache, f.boss, FacetPage::Objects).unwrap();
    let groups = bundle.groups.expect("objects page carries groups");
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].label, "datacenters");
    assert!(bundle.engineers.is_none());
}

#[test]
fn unknown_page_name_is_rejected() {
    let err = FacetPage::from_str("boards").unwrap_err();
    assert!(matches!(err, FacetError::UnknownPage(name) if name == "boards"));
}
