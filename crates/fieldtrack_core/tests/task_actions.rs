use fieldtrack_core::cache::{CacheCoordinator, CacheNamespace, MemoryCacheStore};
use fieldtrack_core::db::{open_db_in_memory, DbError};
use fieldtrack_core::model::ActorId;
use fieldtrack_core::repo::object_repo::{
    NewObject, ObjectRepoError, ObjectRepository, SqliteObjectRepository,
};
use fieldtrack_core::repo::org_repo::{NewEngineer, OrgRepository, SqliteOrgRepository};
use fieldtrack_core::repo::task_repo::{NewTask, SqliteTaskRepository, TaskRepository};
use fieldtrack_core::service::events::{DomainEvent, NotificationSink, SqliteNotificationSink};
use fieldtrack_core::service::{object_actions, task_actions, ServiceError};
use rusqlite::Connection;
use std::sync::Arc;

fn cache() -> CacheCoordinator {
    CacheCoordinator::new(Arc::new(MemoryCacheStore::new()))
}

struct Fixture {
    creator: i64,
    worker: i64,
    worker_eng: i64,
    other_eng: i64,
    task: i64,
}

fn seed(conn: &Connection) -> Fixture {
    let org = SqliteOrgRepository::new(conn);
    let creator = org.create_actor("creator", false).unwrap();
    let worker = org.create_actor("worker", false).unwrap();
    let worker_eng = org
        .create_engineer(&NewEngineer {
            first_name: "Wren".to_string(),
            second_name: "Works".to_string(),
            actor_id: Some(worker.id),
            ..Default::default()
        })
        .unwrap();
    let other_eng = org
        .create_engineer(&NewEngineer {
            first_name: "Otto".to_string(),
            second_name: "Other".to_string(),
            ..Default::default()
        })
        .unwrap();

    let tasks = SqliteTaskRepository::new(conn);
    let task = tasks
        .create_task(&NewTask {
            header: "check antenna".to_string(),
            creator_id: creator.id,
            ..Default::default()
        })
        .unwrap();

    Fixture {
        creator: creator.id,
        worker: worker.id,
        worker_eng: worker_eng.id,
        other_eng: other_eng.id,
        task: task.id,
    }
}

/// Sink standing in for a notification backend that is down.
struct RefusingSink;

impl NotificationSink for RefusingSink {
    fn notify(
        &self,
        _conn: &Connection,
        _actor_id: ActorId,
        _message: &str,
        _timestamp_ms: i64,
    ) -> Result<(), DbError> {
        Err(DbError::Sqlite(rusqlite::Error::InvalidQuery))
    }
}

fn notifications_for(conn: &Connection, actor_id: i64) -> Vec<String> {
    let mut stmt = conn
        .prepare("SELECT message FROM notifications WHERE actor_id = ?1 ORDER BY id ASC;")
        .unwrap();
    let rows = stmt
        .query_map([actor_id], |row| row.get::<_, String>(0))
        .unwrap();
    rows.map(|row| row.unwrap()).collect()
}

#[test]
fn take_task_assigns_logs_and_notifies_the_creator() {
    let conn = open_db_in_memory().unwrap();
    let cache = cache();
    let f = seed(&conn);
    let sink = SqliteNotificationSink;

    task_actions::take_task(&conn, &cache, &sink, f.worker, f.task).unwrap();

    let tasks = SqliteTaskRepository::new(&conn);
    assert_eq!(tasks.engineers_for_task(f.task).unwrap(), vec![f.worker_eng]);

    let task = tasks.get_task(f.task, false).unwrap().unwrap();
    assert!(task.completion_text.contains("Wren Works took the task"));

    let messages = notifications_for(&conn, f.creator);
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("took task"));
    assert!(cache.version(CacheNamespace::TasksPage) > 1);
}

#[test]
fn taking_a_task_twice_is_a_silent_no_op() {
    let conn = open_db_in_memory().unwrap();
    let cache = cache();
    let f = seed(&conn);
    let sink = SqliteNotificationSink;

    task_actions::take_task(&conn, &cache, &sink, f.worker, f.task).unwrap();
    task_actions::take_task(&conn, &cache, &sink, f.worker, f.task).unwrap();

    assert_eq!(notifications_for(&conn, f.creator).len(), 1);
    let tasks = SqliteTaskRepository::new(&conn);
    let task = tasks.get_task(f.task, false).unwrap().unwrap();
    assert_eq!(task.completion_text.matches("took the task").count(), 1);
}

#[test]
fn take_task_requires_an_engineer_profile() {
    let conn = open_db_in_memory().unwrap();
    let cache = cache();
    let f = seed(&conn);
    let sink = SqliteNotificationSink;

    let err = task_actions::take_task(&conn, &cache, &sink, f.creator, f.task).unwrap_err();
    assert!(matches!(err, ServiceError::NoEngineer(actor) if actor == f.creator));
}

#[test]
fn set_assignees_reports_the_engineer_diff_and_notifies() {
    let conn = open_db_in_memory().unwrap();
    let cache = cache();
    let f = seed(&conn);
    let sink = SqliteNotificationSink;

    let events = task_actions::set_assignees(
        &conn,
        &cache,
        &sink,
        f.creator,
        f.task,
        &[f.worker_eng, f.other_eng],
        &[],
    )
    .unwrap();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|event| matches!(
        event,
        DomainEvent::AssignmentAdded { .. }
    )));

    // Otto has no linked actor, so only Wren is notified.
    assert_eq!(notifications_for(&conn, f.worker).len(), 1);

    let events = task_actions::set_assignees(
        &conn,
        &cache,
        &sink,
        f.creator,
        f.task,
        &[f.other_eng],
        &[],
    )
    .unwrap();
    assert_eq!(
        events,
        vec![DomainEvent::AssignmentRemoved {
            task_id: f.task,
            engineer_id: f.worker_eng,
        }]
    );
    assert!(notifications_for(&conn, f.worker)[1].contains("removed you"));
}

#[test]
fn complete_and_reopen_flip_status_and_log_lines() {
    let conn = open_db_in_memory().unwrap();
    let cache = cache();
    let f = seed(&conn);
    let sink = SqliteNotificationSink;

    task_actions::complete_task(&conn, &cache, &sink, f.worker, f.task, "replaced the mast")
        .unwrap();
    let tasks = SqliteTaskRepository::new(&conn);
    let task = tasks.get_task(f.task, false).unwrap().unwrap();
    assert!(task.is_done);
    assert!(task.completion_text.contains("replaced the mast"));
    assert!(notifications_for(&conn, f.creator)[0].contains("completed task"));

    task_actions::reopen_task(&conn, &cache, f.worker, f.task).unwrap();
    let task = tasks.get_task(f.task, false).unwrap().unwrap();
    assert!(!task.is_done);
    assert!(task.completion_text.contains("reopened the task"));
}

#[test]
fn only_the_creator_or_a_superuser_may_delete() {
    let conn = open_db_in_memory().unwrap();
    let cache = cache();
    let f = seed(&conn);

    let err = task_actions::soft_delete_task(&conn, &cache, f.worker, f.task).unwrap_err();
    assert!(matches!(err, ServiceError::PermissionDenied { .. }));

    task_actions::soft_delete_task(&conn, &cache, f.creator, f.task).unwrap();
    let tasks = SqliteTaskRepository::new(&conn);
    assert!(tasks.get_task(f.task, false).unwrap().is_none());
    assert!(tasks.get_task(f.task, true).unwrap().unwrap().deleted);

    // Superusers may delete tasks they did not create.
    let org = SqliteOrgRepository::new(&conn);
    let root = org.create_actor("root", true).unwrap();
    let second = tasks
        .create_task(&NewTask {
            header: "another".to_string(),
            creator_id: f.creator,
            ..Default::default()
        })
        .unwrap();
    task_actions::soft_delete_task(&conn, &cache, root.id, second.id).unwrap();
}

#[test]
fn comment_notifies_creator_and_assignees_but_not_the_author() {
    let conn = open_db_in_memory().unwrap();
    let cache = cache();
    let f = seed(&conn);
    let sink = SqliteNotificationSink;

    task_actions::take_task(&conn, &cache, &sink, f.worker, f.task).unwrap();
    let before = notifications_for(&conn, f.worker).len();

    task_actions::comment_task(&conn, &cache, &sink, f.worker, f.task, "on my way").unwrap();

    // The creator hears about it; the commenting assignee does not.
    let creator_messages = notifications_for(&conn, f.creator);
    assert!(creator_messages
        .last()
        .unwrap()
        .contains("commented on task"));
    assert_eq!(notifications_for(&conn, f.worker).len(), before);

    let tasks = SqliteTaskRepository::new(&conn);
    let comments = tasks.list_comments(f.task).unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].text, "on my way");
}

#[test]
fn failed_notification_rolls_back_the_completion() {
    let conn = open_db_in_memory().unwrap();
    let cache = cache();
    let f = seed(&conn);

    let err = task_actions::complete_task(&conn, &cache, &RefusingSink, f.worker, f.task, "done")
        .unwrap_err();
    assert!(matches!(err, ServiceError::Db(_)));

    // Nothing of the mutation survives: no status flip, no log line, no rows.
    let tasks = SqliteTaskRepository::new(&conn);
    let task = tasks.get_task(f.task, false).unwrap().unwrap();
    assert!(!task.is_done);
    assert!(task.completion_text.is_empty());
    assert!(notifications_for(&conn, f.creator).is_empty());
}

#[test]
fn failed_notification_rolls_back_the_assignment() {
    let conn = open_db_in_memory().unwrap();
    let cache = cache();
    let f = seed(&conn);

    let err =
        task_actions::take_task(&conn, &cache, &RefusingSink, f.worker, f.task).unwrap_err();
    assert!(matches!(err, ServiceError::Db(_)));

    let tasks = SqliteTaskRepository::new(&conn);
    assert!(tasks.engineers_for_task(f.task).unwrap().is_empty());
    let task = tasks.get_task(f.task, false).unwrap().unwrap();
    assert!(task.completion_text.is_empty());

    // A working sink on the same connection still goes through afterwards.
    task_actions::take_task(&conn, &cache, &SqliteNotificationSink, f.worker, f.task).unwrap();
    assert_eq!(tasks.engineers_for_task(f.task).unwrap(), vec![f.worker_eng]);
}

#[test]
fn failed_notification_rolls_back_the_assignee_replacement() {
    let conn = open_db_in_memory().unwrap();
    let cache = cache();
    let f = seed(&conn);

    let err = task_actions::set_assignees(
        &conn,
        &cache,
        &RefusingSink,
        f.creator,
        f.task,
        &[f.worker_eng],
        &[],
    )
    .unwrap_err();
    assert!(matches!(err, ServiceError::Db(_)));

    let tasks = SqliteTaskRepository::new(&conn);
    assert!(tasks.engineers_for_task(f.task).unwrap().is_empty());
    assert!(notifications_for(&conn, f.worker).is_empty());
}

#[test]
fn object_reparenting_rejects_cycles() {
    let conn = open_db_in_memory().unwrap();
    let cache = cache();

    let objects = SqliteObjectRepository::new(&conn);
    let site = objects
        .create_object(&NewObject {
            name: "site".to_string(),
            ..Default::default()
        })
        .unwrap();
    let building = objects
        .create_object(&NewObject {
            name: "building".to_string(),
            parent_id: Some(site.id),
            ..Default::default()
        })
        .unwrap();
    let floor = objects
        .create_object(&NewObject {
            name: "floor".to_string(),
            parent_id: Some(building.id),
            ..Default::default()
        })
        .unwrap();

    // site -> floor would close the loop site -> building -> floor -> site.
    let err =
        object_actions::set_object_parent(&conn, &cache, site.id, Some(floor.id)).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Object(ObjectRepoError::ParentCycle { .. })
    ));

    // Self-parenting is the smallest cycle.
    let err =
        object_actions::set_object_parent(&conn, &cache, site.id, Some(site.id)).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Object(ObjectRepoError::ParentCycle { .. })
    ));

    // A legal move still works and bumps the object namespace.
    object_actions::set_object_parent(&conn, &cache, floor.id, Some(site.id)).unwrap();
    assert!(cache.version(CacheNamespace::ObjectsPage) > 1);
}
