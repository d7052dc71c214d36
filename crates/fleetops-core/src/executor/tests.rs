use super::*;
use crate::event_bus::{Event, EventStatus};
use crate::model::{Host, HostAuth, HostStatus, Task};
use crate::store::MemoryStore;
use crate::testing::{Call, FakeConnector, Outcome};
use std::time::Duration;

struct Harness {
    store: Arc<MemoryStore>,
    bus: EventBus,
    connector: Arc<FakeConnector>,
    executor: RemoteExecutor,
}

fn harness() -> Harness {
    harness_with(FakeConnector::new())
}

fn harness_with(connector: FakeConnector) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let bus = EventBus::new(64);
    let connector = Arc::new(connector);
    let executor = RemoteExecutor::new(store.clone(), bus.clone(), connector.clone());
    Harness {
        store,
        bus,
        connector,
        executor,
    }
}

async fn pending_row(store: &MemoryStore, address: &str) -> (Task, Host, HostExecution) {
    let task = Task::new("t", "echo ok");
    let host = Host::new(address, address, "ops", HostAuth::password("pw"));
    let row = HostExecution::pending(task.id, host.id, 0);
    store.create_task(&task).await.unwrap();
    store.create_host(&host).await.unwrap();
    store.create_host_execution(&row).await.unwrap();
    (task, host, row)
}

fn drain(sub: &mut crate::event_bus::Subscription) -> Vec<Event> {
    let mut events = Vec::new();
    while let Some(event) = sub.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_success_path() {
    let h = harness();
    let (task, host, row) = pending_row(&h.store, "10.0.0.1").await;
    h.connector.script(
        "10.0.0.1",
        Outcome::Exit {
            stdout: "ok\n".into(),
            stderr: "warning: foo\n".into(),
            code: 0,
        },
    );
    let mut sub = h.bus.subscribe_task(task.id);

    let done = h
        .executor
        .execute(task.id, row.clone(), &host.connection_params(), &task.command)
        .await;

    assert_eq!(done.status, HostStatus::Success);
    assert_eq!(done.exit_code, Some(0));

    let stored = h.store.get_host_execution(row.id).await.unwrap();
    assert_eq!(stored.status, HostStatus::Success);
    assert!(stored.started_at.is_some() && stored.finished_at.is_some());

    let events = drain(&mut sub);
    let lines: Vec<&str> = events.iter().map(|e| e.line.as_str()).collect();
    assert_eq!(
        lines,
        vec![
            "--- Start executing on 10.0.0.1 ---",
            "ok\n",
            "warning: foo\n",
            "--- Finished with exit code 0 ---",
        ]
    );
    assert_eq!(events[0].status, EventStatus::Running);
    assert_eq!(events[3].status, EventStatus::Success);
    assert!(events.iter().all(|e| e.host_id == Some(host.id)));
}

#[tokio::test(start_paused = true)]
async fn test_running_row_and_start_line_precede_the_command() {
    let h = harness_with(FakeConnector::new().with_delay(Duration::from_secs(30)));
    let (task, host, row) = pending_row(&h.store, "10.0.0.1").await;
    let mut sub = h.bus.subscribe_task(task.id);

    let params = host.connection_params();
    let execution = h
        .executor
        .execute(task.id, row.clone(), &params, &task.command);
    let observe = async {
        let start = sub.recv().await.unwrap();
        let stored = h.store.get_host_execution(row.id).await.unwrap();
        (start, stored, h.connector.calls())
    };
    let (done, (start, mid_flight, calls)) = tokio::join!(execution, observe);

    // the command was still running when these were observed
    assert_eq!(calls, vec![Call::Started("10.0.0.1".into())]);
    assert_eq!(mid_flight.status, HostStatus::Running);
    assert!(mid_flight.started_at.is_some());
    assert!(mid_flight.finished_at.is_none());
    assert_eq!(start.status, EventStatus::Running);
    assert_eq!(start.host_id, Some(host.id));
    assert_eq!(start.line, "--- Start executing on 10.0.0.1 ---");

    assert_eq!(done.status, HostStatus::Success);
    assert!(sub
        .try_recv()
        .is_some_and(|e| e.line == "ok\n"));
}

#[tokio::test]
async fn test_nonzero_exit_marks_failed() {
    let h = harness();
    let (task, host, row) = pending_row(&h.store, "10.0.0.2").await;
    h.connector.script("10.0.0.2", Outcome::exit(3, ""));
    let mut sub = h.bus.subscribe_task(task.id);

    let done = h
        .executor
        .execute(task.id, row, &host.connection_params(), "false")
        .await;

    assert_eq!(done.status, HostStatus::Failed);
    assert_eq!(done.exit_code, Some(3));
    assert!(done.error.is_none());

    let events = drain(&mut sub);
    // empty streams are not published
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].status, EventStatus::Failed);
    assert_eq!(events[1].line, "--- Finished with exit code 3 ---");
}

#[tokio::test]
async fn test_connection_error_recorded() {
    let h = harness();
    let (task, host, row) = pending_row(&h.store, "10.0.0.3").await;
    h.connector
        .script("10.0.0.3", Outcome::Unreachable("connection refused".into()));
    let mut sub = h.bus.subscribe_task(task.id);

    let done = h
        .executor
        .execute(task.id, row.clone(), &host.connection_params(), "uptime")
        .await;

    assert_eq!(done.status, HostStatus::Failed);
    assert!(done.exit_code.is_none());
    assert!(done.error.as_deref().unwrap().contains("connection refused"));

    let stored = h.store.get_host_execution(row.id).await.unwrap();
    assert_eq!(stored.status, HostStatus::Failed);
    assert_eq!(stored.error, done.error);

    let events = drain(&mut sub);
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].status, EventStatus::Running);
    assert_eq!(events[1].status, EventStatus::Failed);
    assert!(events[1].line.starts_with("Error: "));
}

#[tokio::test]
async fn test_non_pending_row_is_left_alone() {
    let h = harness();
    let (task, host, mut row) = pending_row(&h.store, "10.0.0.4").await;
    row.start().unwrap();
    row.complete(0).unwrap();

    let done = h
        .executor
        .execute(task.id, row.clone(), &host.connection_params(), "uptime")
        .await;

    assert_eq!(done, row);
    assert!(h.connector.executed().is_empty());
}

#[tokio::test]
async fn test_reject_fails_without_connecting() {
    let h = harness();
    let (task, _host, row) = pending_row(&h.store, "10.0.0.5").await;
    let mut sub = h.bus.subscribe_task(task.id);

    let done = h.executor.reject(task.id, row.clone(), "host not found").await;

    assert_eq!(done.status, HostStatus::Failed);
    assert_eq!(done.error.as_deref(), Some("host not found"));
    assert!(h.connector.executed().is_empty());
    assert_eq!(
        h.store.get_host_execution(row.id).await.unwrap().status,
        HostStatus::Failed
    );
    let events = drain(&mut sub);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].line, "Error: host not found");
}
