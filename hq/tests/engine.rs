//! Integration tests for the HabitQuest engine
//!
//! These tests drive the public API against an on-disk store.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use habitquest::domain::{TaskDraft, TaskType};
use habitquest::feed::{DashboardView, FeedHandle};
use habitquest::profile::ProfileService;
use habitquest::quest::{QuestError, QuestManager};
use habitquest::state::{Persistence, StateManager};
use tempfile::TempDir;
use tokio::sync::watch;

fn open(temp_dir: &TempDir) -> Arc<dyn Persistence> {
    let state = StateManager::spawn(temp_dir.path().join("habitquest.db")).expect("Failed to spawn state manager");
    Arc::new(state)
}

fn drafts() -> Vec<TaskDraft> {
    vec![
        TaskDraft::new("Stretch for 5 minutes", TaskType::Daily, 10),
        TaskDraft::new("Run twice this week", TaskType::Weekly, 60),
        TaskDraft::new("Run a 5k", TaskType::Milestone, 180),
    ]
}

// =============================================================================
// Quest Lifecycle
// =============================================================================

#[tokio::test]
async fn test_quest_lifecycle_persists_across_restart() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    let quest_id = {
        let quests = QuestManager::new(open(&temp_dir));
        let quest = quests.create_quest("u1", "Morning Runner", drafts()).await.expect("create");
        assert!(!quest.is_active, "New quests start inactive");
        quests.equip("u1", &quest.id).await.expect("equip");
        quest.id
    };

    // Reopen the same database
    let quests = QuestManager::new(open(&temp_dir));
    let active = quests.active_quest("u1").await.expect("active").expect("one active quest");
    assert_eq!(active.id, quest_id);
    assert_eq!(quests.tasks("u1").await.expect("tasks").len(), 3);

    let removed = quests.delete_quest("u1", &quest_id).await.expect("delete");
    assert_eq!(removed, 3);
    assert!(quests.quests("u1").await.expect("quests").is_empty());
    assert!(quests.tasks("u1").await.expect("tasks").is_empty());
}

#[tokio::test]
async fn test_equip_keeps_single_active_quest() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let quests = QuestManager::new(open(&temp_dir));

    let a = quests.create_quest("u1", "Guitar", vec![]).await.expect("create a");
    let b = quests.create_quest("u1", "Running", vec![]).await.expect("create b");
    let other = quests.create_quest("u2", "Chess", vec![]).await.expect("create other");
    quests.equip("u2", &other.id).await.expect("equip other");

    quests.equip("u1", &a.id).await.expect("equip a");
    quests.equip("u1", &b.id).await.expect("equip b");

    let active: Vec<_> = quests
        .quests("u1")
        .await
        .expect("quests")
        .into_iter()
        .filter(|q| q.is_active)
        .collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, b.id);

    // Another user's active quest is untouched
    assert_eq!(
        quests.active_quest("u2").await.expect("active").map(|q| q.id),
        Some(other.id.clone())
    );

    // Equipping someone else's quest reads as not found
    assert!(matches!(
        quests.equip("u1", &other.id).await,
        Err(QuestError::QuestNotFound(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_equips_leave_one_active() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let quests = QuestManager::new(open(&temp_dir));
    let a = quests.create_quest("u1", "Guitar", vec![]).await.expect("create a");
    let b = quests.create_quest("u1", "Running", vec![]).await.expect("create b");

    for round in 0..50 {
        let (qa, qb) = (quests.clone(), quests.clone());
        let (ida, idb) = (a.id.clone(), b.id.clone());
        let equip_a = tokio::spawn(async move { qa.equip("u1", &ida).await });
        let equip_b = tokio::spawn(async move { qb.equip("u1", &idb).await });
        equip_a.await.expect("join a").expect("equip a");
        equip_b.await.expect("join b").expect("equip b");

        let active: Vec<_> = quests
            .quests("u1")
            .await
            .expect("quests")
            .into_iter()
            .filter(|q| q.is_active)
            .map(|q| q.id)
            .collect();
        assert_eq!(active.len(), 1, "round {round}: {active:?}");
        assert!(active[0] == a.id || active[0] == b.id);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_equip_racing_unequip_never_reports_violation() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let quests = QuestManager::new(open(&temp_dir));
    let quest = quests.create_quest("u1", "Guitar", vec![]).await.expect("create");

    for _ in 0..50 {
        let (qe, qu) = (quests.clone(), quests.clone());
        let (ide, idu) = (quest.id.clone(), quest.id.clone());
        let equip = tokio::spawn(async move { qe.equip("u1", &ide).await });
        let unequip = tokio::spawn(async move { qu.unequip("u1", &idu).await });

        let equipped = equip.await.expect("join equip").expect("equip");
        assert!(equipped.is_active);
        unequip.await.expect("join unequip").expect("unequip");

        let active = quests.quests("u1").await.expect("quests").into_iter().filter(|q| q.is_active).count();
        assert!(active <= 1);
    }
}

#[tokio::test]
async fn test_partial_persistence_leaves_quest_for_retry() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let quests = QuestManager::new(open(&temp_dir));

    let mut bad = drafts();
    bad.push(TaskDraft::new("Worthless", TaskType::Milestone, 0));

    let err = quests.create_quest("u1", "Broken", bad).await.unwrap_err();
    let quest_id = err.orphaned_quest().expect("quest id reported").to_string();
    assert!(matches!(err, QuestError::PartialPersistence { .. }));

    // The batch is all-or-nothing
    assert!(quests.tasks("u1").await.expect("tasks").is_empty());

    let tasks = quests
        .retry_task_batch("u1", &quest_id, drafts())
        .await
        .expect("retry");
    assert_eq!(tasks.len(), 3);
    assert!(tasks.iter().all(|t| t.quest_id.as_deref() == Some(quest_id.as_str())));
}

// =============================================================================
// Completion and Reset
// =============================================================================

#[tokio::test]
async fn test_completion_awards_xp_once() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let state = open(&temp_dir);
    let quests = QuestManager::new(state.clone());
    let profiles = ProfileService::new(state);
    profiles.ensure_profile("u1", None).await.expect("profile");

    let quest = quests.create_quest("u1", "Runner", drafts()).await.expect("create");
    let tasks = quests.tasks("u1").await.expect("tasks");
    let daily = tasks.iter().find(|t| t.task_type == TaskType::Daily).expect("daily");

    let outcome = quests.complete_task("u1", &daily.id).await.expect("complete");
    assert_eq!(outcome.xp_before, 0);
    assert_eq!(outcome.xp_after, 10);

    assert!(matches!(
        quests.complete_task("u1", &daily.id).await,
        Err(QuestError::AlreadyComplete(_))
    ));
    assert_eq!(profiles.stats("u1").await.expect("stats").profile.xp, 10);

    // Weekly is locked on day one and opens after the sixth day
    let weekly = tasks.iter().find(|t| t.task_type == TaskType::Weekly).expect("weekly");
    assert!(matches!(
        quests.complete_task("u1", &weekly.id).await,
        Err(QuestError::TaskLocked { .. })
    ));
    let later = quest.created_at_utc() + chrono::Duration::days(7);
    let outcome = quests
        .complete_task_at("u1", &weekly.id, later)
        .await
        .expect("complete weekly");
    assert_eq!(outcome.xp_after, 70);
}

#[tokio::test]
async fn test_level_up_reported() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let quests = QuestManager::new(open(&temp_dir));

    let task = quests
        .add_task_with("u1", None, TaskDraft::new("Big push", TaskType::Milestone, 100))
        .await
        .expect("add");
    let outcome = quests.complete_task("u1", &task.id).await.expect("complete");
    assert_eq!(outcome.level_before(), 1);
    assert_eq!(outcome.level_after(), 2);
    assert!(outcome.leveled_up());
}

#[tokio::test]
async fn test_reset_daily_is_idempotent() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let quests = QuestManager::new(open(&temp_dir));

    let daily = quests.add_task("u1", None, "Meditate").await.expect("add daily");
    let weekly = quests
        .add_task_with("u1", None, TaskDraft::new("Long walk", TaskType::Weekly, 50))
        .await
        .expect("add weekly");
    quests.complete_task("u1", &daily.id).await.expect("complete daily");
    quests.complete_task("u1", &weekly.id).await.expect("complete weekly");

    assert_eq!(quests.reset_daily("u1").await.expect("reset"), 1);
    assert_eq!(quests.reset_daily("u1").await.expect("reset again"), 0);

    let tasks = quests.tasks("u1").await.expect("tasks");
    let daily = tasks.iter().find(|t| t.id == daily.id).expect("daily");
    let weekly = tasks.iter().find(|t| t.id == weekly.id).expect("weekly");
    assert!(!daily.is_complete);
    assert!(weekly.is_complete, "Only daily tasks are reopened");
}

#[tokio::test]
async fn test_task_views_report_locks() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let quests = QuestManager::new(open(&temp_dir));
    quests.create_quest("u1", "Runner", drafts()).await.expect("create");

    let views = quests.task_views("u1", Utc::now()).await.expect("views");
    let locked = views.iter().filter(|v| v.lock.is_locked()).count();
    assert_eq!(locked, 2, "Weekly and Milestone are locked on day one");
}

// =============================================================================
// Change Feed
// =============================================================================

async fn wait_for(rx: &mut watch::Receiver<DashboardView>, pred: impl Fn(&DashboardView) -> bool) -> DashboardView {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if pred(&rx.borrow_and_update()) {
                return rx.borrow().clone();
            }
            rx.changed().await.expect("feed closed");
        }
    })
    .await
    .expect("Timed out waiting for the dashboard")
}

#[tokio::test]
async fn test_feed_follows_completion() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let state = open(&temp_dir);
    let quests = QuestManager::new(state.clone());
    ProfileService::new(state.clone())
        .ensure_profile("u1", None)
        .await
        .expect("profile");
    let task = quests.add_task("u1", None, "Walk").await.expect("add");

    let feed = FeedHandle::spawn(state, "u1").await.expect("spawn feed");
    let mut rx = feed.subscribe();
    assert_eq!(feed.view().tasks.len(), 1);

    assert!(feed.optimistic_complete(&task.id));
    assert!(feed.view().is_provisional());

    quests.complete_task("u1", &task.id).await.expect("complete");
    let view = wait_for(&mut rx, |v| !v.is_provisional() && v.xp() == 10).await;
    assert!(view.tasks[0].is_complete);

    feed.shutdown().await;
}

#[tokio::test]
async fn test_feed_ignores_other_users() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let state = open(&temp_dir);
    let quests = QuestManager::new(state.clone());

    let feed = FeedHandle::spawn(state, "u1").await.expect("spawn feed");
    let before = feed.view().revision;

    quests.add_task("u2", None, "Not mine").await.expect("add other");
    quests.add_task("u1", None, "Mine").await.expect("add mine");

    let mut rx = feed.subscribe();
    let view = wait_for(&mut rx, |v| v.tasks.len() == 1).await;
    assert_eq!(view.tasks[0].title, "Mine");
    assert!(view.revision > before);

    feed.shutdown().await;
}

#[tokio::test]
async fn test_feed_follows_writes_from_another_process() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    // Two managers on one file stand in for two `hq` processes
    let watcher = open(&temp_dir);
    let writer = QuestManager::new(open(&temp_dir));

    let feed = FeedHandle::spawn(watcher, "u1").await.expect("spawn feed");
    let mut rx = feed.subscribe();
    assert!(feed.view().tasks.is_empty());

    writer.add_task("u1", None, "Stretch").await.expect("add");

    let view = wait_for(&mut rx, |v| v.tasks.len() == 1).await;
    assert_eq!(view.tasks[0].title, "Stretch");

    feed.shutdown().await;
}
