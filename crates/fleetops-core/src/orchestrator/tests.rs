use super::*;
use crate::event_bus::Subscription;
use crate::model::{DispatchMode, FailurePolicy, Host, HostAuth};
use crate::store::MemoryStore;
use crate::testing::{Call, FakeConnector, Outcome};
use std::time::Duration;

struct Harness {
    store: Arc<MemoryStore>,
    bus: EventBus,
    connector: Arc<FakeConnector>,
    orchestrator: Orchestrator,
}

fn harness(connector: FakeConnector) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let bus = EventBus::new(256);
    let connector = Arc::new(connector);
    let executor = Arc::new(RemoteExecutor::new(
        store.clone(),
        bus.clone(),
        connector.clone(),
    ));
    let orchestrator = Orchestrator::new(store.clone(), bus.clone(), executor);
    Harness {
        store,
        bus,
        connector,
        orchestrator,
    }
}

/// Store `task` with one host per address; returns the pending rows in order.
async fn seed(store: &MemoryStore, task: &Task, addresses: &[&str]) -> Vec<HostExecution> {
    store.create_task(task).await.unwrap();
    let mut rows = Vec::new();
    for (position, address) in addresses.iter().enumerate() {
        let host = Host::new(*address, *address, "ops", HostAuth::password("pw"));
        store.create_host(&host).await.unwrap();
        let row = HostExecution::pending(task.id, host.id, position as u32);
        store.create_host_execution(&row).await.unwrap();
        rows.push(row);
    }
    rows
}

async fn statuses(store: &MemoryStore, task_id: Uuid) -> Vec<HostStatus> {
    store
        .list_host_executions(task_id)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.status)
        .collect()
}

fn drain(sub: &mut Subscription) -> Vec<Event> {
    let mut events = Vec::new();
    while let Some(event) = sub.try_recv() {
        events.push(event);
    }
    events
}

#[test]
fn test_plan_batches() {
    assert_eq!(plan_batches(0, 3), Vec::<Range<usize>>::new());
    assert_eq!(plan_batches(4, 2), vec![0..2, 2..4]);
    assert_eq!(plan_batches(5, 2), vec![0..2, 2..4, 4..5]);
    assert_eq!(plan_batches(3, 0), vec![0..3]);
    assert_eq!(plan_batches(3, 10), vec![0..3]);

    for total in 1..20 {
        for size in 1..7 {
            let batches = plan_batches(total, size);
            assert_eq!(batches.len(), total.div_ceil(size));
            assert_eq!(batches.iter().map(|r| r.len()).sum::<usize>(), total);
        }
    }
}

#[tokio::test]
async fn test_broadcast_all_succeed() {
    let h = harness(FakeConnector::new());
    let task = Task::new("echo", "echo ok");
    let rows = seed(&h.store, &task, &["h1", "h2", "h3"]).await;
    let mut sub = h.bus.subscribe_task(task.id);

    let outcome = h.orchestrator.dispatch(&task, rows, 5).await;

    assert_eq!(outcome.batches_total, 1);
    assert_eq!(outcome.batches_run, 1);
    assert!(!outcome.paused);
    assert_eq!(statuses(&h.store, task.id).await, vec![HostStatus::Success; 3]);

    let finished = drain(&mut sub)
        .into_iter()
        .filter(|e| e.line.starts_with("--- Finished"))
        .count();
    assert_eq!(finished, 3);
}

#[tokio::test]
async fn test_empty_host_list_completes_immediately() {
    let h = harness(FakeConnector::new());
    let task = Task::new("noop", "true");
    h.store.create_task(&task).await.unwrap();

    let outcome = h.orchestrator.dispatch(&task, Vec::new(), 5).await;

    assert_eq!(outcome.batches_total, 0);
    assert_eq!(outcome.batches_run, 0);
    assert!(h.connector.executed().is_empty());
}

#[tokio::test]
async fn test_concurrency_is_bounded() {
    let h = harness(FakeConnector::new().with_delay(Duration::from_millis(20)));
    let task = Task::new("slow", "sleep 1");
    let addresses: Vec<String> = (0..8).map(|i| format!("h{}", i)).collect();
    let refs: Vec<&str> = addresses.iter().map(String::as_str).collect();
    let rows = seed(&h.store, &task, &refs).await;

    h.orchestrator.dispatch(&task, rows, 3).await;

    assert_eq!(h.connector.peak_in_flight(), 3);
    assert_eq!(statuses(&h.store, task.id).await, vec![HostStatus::Success; 8]);
}

#[tokio::test]
async fn test_batches_run_strictly_in_order() {
    let h = harness(FakeConnector::new().with_delay(Duration::from_millis(10)));
    let task = Task::new("rolling", "restart")
        .with_mode(DispatchMode::Batch)
        .with_batch_size(2);
    let rows = seed(&h.store, &task, &["a", "b", "c", "d", "e"]).await;

    let outcome = h.orchestrator.dispatch(&task, rows, 5).await;
    assert_eq!(outcome.batches_total, 3);
    assert_eq!(outcome.batches_run, 3);

    // every host of a batch finishes before any host of the next starts
    let calls = h.connector.calls();
    let position = |call: Call| calls.iter().position(|c| *c == call).unwrap();
    let batches = [vec!["a", "b"], vec!["c", "d"], vec!["e"]];
    for pair in batches.windows(2) {
        let last_finish = pair[0]
            .iter()
            .map(|a| position(Call::Finished(a.to_string())))
            .max()
            .unwrap();
        let first_start = pair[1]
            .iter()
            .map(|a| position(Call::Started(a.to_string())))
            .min()
            .unwrap();
        assert!(last_finish < first_start, "batches overlapped: {:?}", calls);
    }
}

#[tokio::test]
async fn test_pause_on_fail_stops_after_failed_batch() {
    let h = harness(FakeConnector::new());
    h.connector.script("h2", Outcome::exit(1, "boom"));
    let task = Task::new("deploy", "deploy.sh")
        .with_mode(DispatchMode::Batch)
        .with_batch_size(2)
        .with_failure_policy(FailurePolicy::PauseOnFail);
    let rows = seed(&h.store, &task, &["h1", "h2", "h3", "h4"]).await;
    let mut sub = h.bus.subscribe_task(task.id);

    let outcome = h.orchestrator.dispatch(&task, rows, 5).await;

    assert!(outcome.paused);
    assert_eq!(outcome.batches_run, 1);
    assert!(h.orchestrator.is_paused(task.id));
    assert_eq!(
        statuses(&h.store, task.id).await,
        vec![
            HostStatus::Success,
            HostStatus::Failed,
            HostStatus::Pending,
            HostStatus::Pending
        ]
    );
    assert_eq!(h.connector.executed(), vec!["h1".to_string(), "h2".to_string()]);

    let paused: Vec<Event> = drain(&mut sub)
        .into_iter()
        .filter(|e| e.status == EventStatus::Paused)
        .collect();
    assert_eq!(paused.len(), 1);
    assert_eq!(paused[0].line, "--- Batch failed, pausing task ---");
    assert!(paused[0].host_id.is_none());
}

#[tokio::test]
async fn test_only_paused_dispatches_are_remembered() {
    let h = harness(FakeConnector::new());
    h.connector.script("bad", Outcome::exit(1, "boom"));
    let pausing = |name: &str| {
        Task::new(name, "deploy.sh")
            .with_mode(DispatchMode::Batch)
            .with_batch_size(1)
            .with_failure_policy(FailurePolicy::PauseOnFail)
    };

    for _ in 0..3 {
        let task = pausing("clean");
        let rows = seed(&h.store, &task, &["ok-1", "ok-2"]).await;
        assert!(!h.orchestrator.dispatch(&task, rows, 5).await.paused);
        assert!(!h.orchestrator.is_paused(task.id));
    }
    assert!(h.orchestrator.paused.is_empty());

    let task = pausing("failing");
    let rows = seed(&h.store, &task, &["bad", "ok-3"]).await;
    assert!(h.orchestrator.dispatch(&task, rows, 5).await.paused);
    assert_eq!(h.orchestrator.paused.len(), 1);

    // a second stopped dispatch of the same task adds nothing
    let bad_host = h.store.list_host_executions(task.id).await.unwrap()[0].host_id;
    let retry = HostExecution::pending(task.id, bad_host, 2);
    h.store.create_host_execution(&retry).await.unwrap();
    assert!(h.orchestrator.dispatch(&task, vec![retry], 5).await.paused);
    assert_eq!(h.orchestrator.paused.len(), 1);
    assert!(h.orchestrator.is_paused(task.id));
}

#[tokio::test]
async fn test_pause_check_only_looks_at_latest_batch() {
    let h = harness(FakeConnector::new());
    let task = Task::new("deploy", "deploy.sh")
        .with_mode(DispatchMode::Batch)
        .with_batch_size(1)
        .with_failure_policy(FailurePolicy::PauseOnFail);
    let mut rows = seed(&h.store, &task, &["h1", "h2", "h3"]).await;

    // an earlier failure, recorded before this dispatch
    let mut first = rows.remove(0);
    first.start().unwrap();
    first.fail("earlier run").unwrap();
    h.store.update_host_execution(&first).await.unwrap();

    let outcome = h.orchestrator.dispatch(&task, rows, 5).await;

    assert!(!outcome.paused);
    assert_eq!(outcome.batches_run, 2);
    assert_eq!(
        statuses(&h.store, task.id).await,
        vec![HostStatus::Failed, HostStatus::Success, HostStatus::Success]
    );
}

#[tokio::test]
async fn test_continue_policy_runs_every_batch() {
    for policy in [Some(FailurePolicy::Continue), None] {
        let h = harness(FakeConnector::new());
        h.connector.script("h1", Outcome::Unreachable("no route".into()));
        let mut task = Task::new("deploy", "deploy.sh")
            .with_mode(DispatchMode::Batch)
            .with_batch_size(1);
        task.failure_policy = policy;
        let rows = seed(&h.store, &task, &["h1", "h2", "h3"]).await;

        let outcome = h.orchestrator.dispatch(&task, rows, 5).await;

        assert!(!outcome.paused);
        assert_eq!(outcome.batches_run, 3);
        assert_eq!(
            statuses(&h.store, task.id).await,
            vec![HostStatus::Failed, HostStatus::Success, HostStatus::Success]
        );
    }
}

#[tokio::test]
async fn test_unknown_host_fails_only_that_row() {
    let h = harness(FakeConnector::new());
    let task = Task::new("t", "uptime");
    let mut rows = seed(&h.store, &task, &["h1"]).await;
    let orphan = HostExecution::pending(task.id, Uuid::new_v4(), 1);
    h.store.create_host_execution(&orphan).await.unwrap();
    rows.push(orphan.clone());

    h.orchestrator.dispatch(&task, rows, 5).await;

    let stored = h.store.get_host_execution(orphan.id).await.unwrap();
    assert_eq!(stored.status, HostStatus::Failed);
    assert!(stored.error.unwrap().contains("host not found"));
    assert_eq!(statuses(&h.store, task.id).await[0], HostStatus::Success);
}

#[tokio::test(start_paused = true)]
async fn test_interval_between_batches_only() {
    let h = harness(FakeConnector::new());
    let task = Task::new("t", "uptime")
        .with_mode(DispatchMode::Batch)
        .with_batch_size(1)
        .with_batch_interval(5);
    let rows = seed(&h.store, &task, &["h1", "h2", "h3"]).await;

    let started = tokio::time::Instant::now();
    h.orchestrator.dispatch(&task, rows, 5).await;

    // two gaps, none after the last batch
    assert_eq!(started.elapsed(), Duration::from_secs(10));
}

#[tokio::test]
async fn test_broadcast_ignores_batch_size() {
    let h = harness(FakeConnector::new());
    let task = Task::new("t", "uptime").with_batch_size(1);
    let rows = seed(&h.store, &task, &["h1", "h2", "h3"]).await;

    let outcome = h.orchestrator.dispatch(&task, rows, 5).await;
    assert_eq!(outcome.batches_total, 1);
}
