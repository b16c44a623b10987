use chrono::{Days, NaiveDate};
use fieldtrack_core::db::open_db_in_memory;
use fieldtrack_core::filter::{apply, PipelineInput, TaskFilterParams};
use fieldtrack_core::model::Priority;
use fieldtrack_core::repo::org_repo::{NewEngineer, OrgRepository, SqliteOrgRepository};
use fieldtrack_core::repo::task_repo::{NewTask, SqliteTaskRepository, TaskRepository};
use fieldtrack_core::visibility::resolve_task_visibility;
use rusqlite::{params, Connection};

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 8, 28).unwrap()
}

fn date_ms(date: NaiveDate) -> i64 {
    date.and_hms_opt(12, 0, 0).unwrap().and_utc().timestamp_millis()
}

struct Fixture {
    boss: i64,
    clerk: i64,
    boss_eng: i64,
    dept: i64,
    urgent_tag: i64,
    t_due_today: i64,
    t_due_tomorrow: i64,
    t_overdue: i64,
    t_done_today: i64,
    t_done_undated: i64,
    t_untagged: i64,
}

fn seed(conn: &Connection) -> Fixture {
    let org = SqliteOrgRepository::new(conn);
    let boss = org.create_actor("boss", true).unwrap();
    let clerk = org.create_actor("clerk", true).unwrap();
    let dept = org.create_department("network").unwrap();
    let boss_eng = org
        .create_engineer(&NewEngineer {
            first_name: "Bo".to_string(),
            second_name: "Sterling".to_string(),
            actor_id: Some(boss.id),
            department_id: Some(dept.id),
            ..Default::default()
        })
        .unwrap();
    let urgent_tag = org.ensure_tag("urgent").unwrap();

    let tasks = SqliteTaskRepository::new(conn);
    let make = |header: &str,
                    completion: Option<i64>,
                    tags: Vec<i64>,
                    engineers: Vec<i64>,
                    priority: Option<Priority>| {
        tasks
            .create_task(&NewTask {
                header: header.to_string(),
                creator_id: boss.id,
                completion_time: completion,
                tag_ids: tags,
                engineer_ids: engineers,
                priority,
                ..Default::default()
            })
            .unwrap()
            .id
    };

    let t_due_today = make(
        "replace router",
        Some(date_ms(today())),
        vec![urgent_tag.id],
        vec![],
        Some(Priority::Critical),
    );
    let t_due_tomorrow = make(
        "splice fiber",
        Some(date_ms(today() + Days::new(1))),
        vec![urgent_tag.id],
        vec![boss_eng.id],
        None,
    );
    let t_overdue = make(
        "swap battery",
        Some(date_ms(today() - Days::new(1))),
        vec![urgent_tag.id],
        vec![],
        None,
    );
    let t_done_today = make(
        "flash firmware",
        Some(date_ms(today())),
        vec![urgent_tag.id],
        vec![],
        None,
    );
    let t_done_undated = make("tidy rack", None, vec![urgent_tag.id], vec![], None);
    let t_untagged = make("sweep floor", None, vec![], vec![], None);

    tasks.set_done(t_done_today, true).unwrap();
    tasks.set_done(t_done_undated, true).unwrap();

    // Deterministic creation order for the create_time tiebreak.
    for (index, id) in [
        t_due_today,
        t_due_tomorrow,
        t_overdue,
        t_done_today,
        t_done_undated,
        t_untagged,
    ]
    .iter()
    .enumerate()
    {
        conn.execute(
            "UPDATE tasks SET create_time = ?2 WHERE id = ?1;",
            params![id, 1_000 + index as i64],
        )
        .unwrap();
    }

    Fixture {
        boss: boss.id,
        clerk: clerk.id,
        boss_eng: boss_eng.id,
        dept: dept.id,
        urgent_tag: urgent_tag.id,
        t_due_today,
        t_due_tomorrow,
        t_overdue,
        t_done_today,
        t_done_undated,
        t_untagged,
    }
}

fn run(
    conn: &Connection,
    actor: i64,
    engineer: Option<i64>,
    params: &TaskFilterParams,
    page: u32,
    per_page: u32,
) -> fieldtrack_core::filter::TaskPage {
    let visibility = resolve_task_visibility(conn, actor).unwrap();
    apply(
        conn,
        &PipelineInput {
            visibility: &visibility,
            params,
            actor_engineer: engineer,
            object_scope: None,
            today: today(),
            page,
            per_page,
        },
    )
    .unwrap()
}

fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
    raw.iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

#[test]
fn counts_are_computed_before_the_status_toggle() {
    let conn = open_db_in_memory().unwrap();
    let f = seed(&conn);

    let params = TaskFilterParams::from_pairs(&pairs(&[(
        "tags",
        &f.urgent_tag.to_string(),
    )]));
    let page = run(&conn, f.boss, Some(f.boss_eng), &params, 1, 50);

    // Default toggle shows active tasks only, but the counters reflect the
    // whole tag-filtered population.
    assert_eq!(page.counts.done_count, 2);
    assert_eq!(page.counts.not_done_count, 3);
    assert_eq!(page.counts.tasks_due_today_count, 1);
    assert_eq!(page.counts.my_tasks_count, 1);
    assert_eq!(page.counts.available_tasks_count, 6);
    assert_eq!(page.total_count, 3);
    assert!(!page.task_ids.contains(&f.t_done_today));
    assert!(!page.task_ids.contains(&f.t_untagged));
}

#[test]
fn default_sort_is_completion_time_descending_with_id_tiebreak() {
    let conn = open_db_in_memory().unwrap();
    let f = seed(&conn);

    let params = TaskFilterParams::from_pairs(&pairs(&[(
        "tags",
        &f.urgent_tag.to_string(),
    )]));
    let page = run(&conn, f.boss, None, &params, 1, 50);
    assert_eq!(
        page.task_ids,
        vec![f.t_due_tomorrow, f.t_due_today, f.t_overdue]
    );
}

#[test]
fn ascending_sort_reverses_the_dated_tasks() {
    let conn = open_db_in_memory().unwrap();
    let f = seed(&conn);

    let params = TaskFilterParams::from_pairs(&pairs(&[
        ("tags", f.urgent_tag.to_string().as_str()),
        ("sort_order", "asc"),
    ]));
    let page = run(&conn, f.boss, None, &params, 1, 50);
    assert_eq!(
        page.task_ids,
        vec![f.t_overdue, f.t_due_today, f.t_due_tomorrow]
    );
}

#[test]
fn done_toggle_selects_completed_tasks_only() {
    let conn = open_db_in_memory().unwrap();
    let f = seed(&conn);

    let params = TaskFilterParams::from_pairs(&pairs(&[
        ("tags", f.urgent_tag.to_string().as_str()),
        ("show_active_task", "false"),
        ("show_done_task", "true"),
    ]));
    let page = run(&conn, f.boss, None, &params, 1, 50);
    assert_eq!(page.task_ids, vec![f.t_done_today, f.t_done_undated]);

    let both = TaskFilterParams::from_pairs(&pairs(&[
        ("tags", f.urgent_tag.to_string().as_str()),
        ("show_done_task", "true"),
    ]));
    assert_eq!(run(&conn, f.boss, None, &both, 1, 50).total_count, 5);

    let neither = TaskFilterParams::from_pairs(&pairs(&[
        ("tags", f.urgent_tag.to_string().as_str()),
        ("show_active_task", "false"),
    ]));
    assert_eq!(run(&conn, f.boss, None, &neither, 1, 50).total_count, 0);
}

#[test]
fn pagination_clamps_page_and_reports_num_pages() {
    let conn = open_db_in_memory().unwrap();
    let f = seed(&conn);

    let params = TaskFilterParams::from_pairs(&pairs(&[(
        "tags",
        &f.urgent_tag.to_string(),
    )]));
    let first = run(&conn, f.boss, None, &params, 1, 2);
    assert_eq!(first.num_pages, 2);
    assert_eq!(first.task_ids, vec![f.t_due_tomorrow, f.t_due_today]);

    let second = run(&conn, f.boss, None, &params, 2, 2);
    assert_eq!(second.task_ids, vec![f.t_overdue]);

    // Out-of-range page numbers clamp to the last page.
    let clamped = run(&conn, f.boss, None, &params, 99, 2);
    assert_eq!(clamped.page, 2);
    assert_eq!(clamped.task_ids, second.task_ids);
}

#[test]
fn my_tasks_only_without_engineer_profile_yields_empty_set() {
    let conn = open_db_in_memory().unwrap();
    let f = seed(&conn);

    let params = TaskFilterParams::from_pairs(&pairs(&[("show_my_tasks_only", "true")]));
    let page = run(&conn, f.clerk, None, &params, 1, 50);
    assert!(page.task_ids.is_empty());
    assert_eq!(page.counts.done_count, 0);
    assert_eq!(page.counts.not_done_count, 0);
    // The available counter ignores user filters entirely.
    assert_eq!(page.counts.available_tasks_count, 6);
}

#[test]
fn assignee_tokens_filter_by_engineer_and_department() {
    let conn = open_db_in_memory().unwrap();
    let f = seed(&conn);

    let by_engineer = TaskFilterParams::from_pairs(&pairs(&[(
        "engineers",
        &format!("eng_{}", f.boss_eng),
    )]));
    let page = run(&conn, f.boss, None, &by_engineer, 1, 50);
    assert_eq!(page.task_ids, vec![f.t_due_tomorrow]);

    // The department token matches through its engineers' assignments.
    let by_department = TaskFilterParams::from_pairs(&pairs(&[(
        "engineers",
        &format!("dep_{}", f.dept),
    )]));
    let dept_page = run(&conn, f.boss, None, &by_department, 1, 50);
    assert_eq!(dept_page.task_ids, vec![f.t_due_tomorrow]);

    // Malformed tokens are dropped; the filter falls away entirely.
    let malformed = TaskFilterParams::from_pairs(&pairs(&[("engineers", "bogus,eng_")]));
    assert!(malformed.assignees.is_empty());
    let open_page = run(&conn, f.boss, None, &malformed, 1, 50);
    assert_eq!(open_page.total_count, 4);
}

#[test]
fn department_token_matches_direct_department_assignments_too() {
    let conn = open_db_in_memory().unwrap();
    let f = seed(&conn);

    // Assigned to the department as a whole; no engineer rows at all.
    let tasks = SqliteTaskRepository::new(&conn);
    let dept_task = tasks
        .create_task(&NewTask {
            header: "inspect uplink".to_string(),
            creator_id: f.boss,
            department_ids: vec![f.dept],
            ..Default::default()
        })
        .unwrap()
        .id;

    let by_department = TaskFilterParams::from_pairs(&pairs(&[(
        "engineers",
        &format!("dep_{}", f.dept),
    )]));
    let page = run(&conn, f.boss, None, &by_department, 1, 50);
    assert_eq!(page.total_count, 2);
    assert!(page.task_ids.contains(&dept_task));
    assert!(page.task_ids.contains(&f.t_due_tomorrow));
}

#[test]
fn search_matches_header_and_text_case_insensitively() {
    let conn = open_db_in_memory().unwrap();
    let f = seed(&conn);

    let params = TaskFilterParams::from_pairs(&pairs(&[("search", "ROUTER")]));
    let page = run(&conn, f.boss, None, &params, 1, 50);
    assert_eq!(page.task_ids, vec![f.t_due_today]);
}

#[test]
fn completion_date_window_bounds_the_set() {
    let conn = open_db_in_memory().unwrap();
    let f = seed(&conn);

    let params = TaskFilterParams::from_pairs(&pairs(&[
        ("completion_time_after", &today().to_string()),
        ("completion_time_before", &today().to_string()),
    ]));
    let page = run(&conn, f.boss, None, &params, 1, 50);
    assert_eq!(page.task_ids, vec![f.t_due_today]);
}

#[test]
fn same_input_produces_identical_pages() {
    let conn = open_db_in_memory().unwrap();
    let f = seed(&conn);

    let params = TaskFilterParams::from_pairs(&pairs(&[(
        "tags",
        &f.urgent_tag.to_string(),
    )]));
    let first = run(&conn, f.boss, Some(f.boss_eng), &params, 1, 2);
    let second = run(&conn, f.boss, Some(f.boss_eng), &params, 1, 2);
    assert_eq!(first, second);
}

#[test]
fn priority_filter_narrows_to_exact_level() {
    let conn = open_db_in_memory().unwrap();
    let f = seed(&conn);

    let params = TaskFilterParams::from_pairs(&pairs(&[("priority", "CRITICAL")]));
    let page = run(&conn, f.boss, None, &params, 1, 50);
    assert_eq!(page.task_ids, vec![f.t_due_today]);
}
