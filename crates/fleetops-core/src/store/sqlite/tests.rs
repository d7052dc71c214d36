use super::*;
use crate::model::{DispatchMode, FailurePolicy, Host, HostAuth, HostExecution, HostStatus, Task};
use crate::store::RecordStore;
use secrecy::{ExposeSecret, SecretString};
use tempfile::TempDir;
use uuid::Uuid;

struct TestContext {
    store: SqliteStore,
    _dir: TempDir,
}

async fn create_test_context() -> TestContext {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("fleetops.db");
    let store = SqliteStore::from_path(&path).await.unwrap();
    TestContext { store, _dir: dir }
}

#[tokio::test]
async fn test_create_and_get_password_host() {
    let ctx = create_test_context().await;
    let store = &ctx.store;

    let host = Host::new("web-1", "192.168.1.10", "deploy", HostAuth::password("pw"))
        .with_port(2222)
        .with_tags(vec!["web".into(), "prod".into()]);
    store.create_host(&host).await.unwrap();

    let fetched = store.get_host(host.id).await.unwrap();
    assert_eq!(fetched.name, "web-1");
    assert_eq!(fetched.port, 2222);
    assert_eq!(fetched.tags, vec!["web".to_string(), "prod".to_string()]);
    match fetched.auth {
        HostAuth::Password(p) => assert_eq!(p.expose_secret(), "pw"),
        other => panic!("unexpected auth: {:?}", other),
    }
}

#[tokio::test]
async fn test_private_key_host() {
    let ctx = create_test_context().await;
    let store = &ctx.store;

    let host = Host::new(
        "db-1",
        "192.168.1.20",
        "root",
        HostAuth::PrivateKey {
            key_path: "/home/ops/.ssh/id_ed25519".into(),
            passphrase: Some(SecretString::from("phrase".to_string())),
        },
    );
    store.create_host(&host).await.unwrap();

    match store.get_host(host.id).await.unwrap().auth {
        HostAuth::PrivateKey {
            key_path,
            passphrase,
        } => {
            assert_eq!(key_path, "/home/ops/.ssh/id_ed25519");
            assert_eq!(passphrase.unwrap().expose_secret(), "phrase");
        }
        other => panic!("unexpected auth: {:?}", other),
    }
    assert_eq!(store.list_hosts().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_missing_records() {
    let ctx = create_test_context().await;
    let store = &ctx.store;
    let id = Uuid::new_v4();

    assert!(matches!(store.get_host(id).await, Err(Error::HostNotFound(_))));
    assert!(matches!(store.get_task(id).await, Err(Error::TaskNotFound(_))));
    assert!(matches!(
        store.get_host_execution(id).await,
        Err(Error::ExecutionNotFound(_))
    ));
}

#[tokio::test]
async fn test_task_round_trip() {
    let ctx = create_test_context().await;
    let store = &ctx.store;

    let task = Task::new("rolling restart", "systemctl restart app")
        .with_mode(DispatchMode::Batch)
        .with_batch_size(3)
        .with_batch_interval(10)
        .with_failure_policy(FailurePolicy::PauseOnFail);
    store.create_task(&task).await.unwrap();

    let fetched = store.get_task(task.id).await.unwrap();
    assert_eq!(fetched.mode, DispatchMode::Batch);
    assert_eq!(fetched.batch_size, Some(3));
    assert_eq!(fetched.batch_interval_secs, Some(10));
    assert_eq!(fetched.failure_policy, Some(FailurePolicy::PauseOnFail));

    let plain = Task::new("uptime", "uptime");
    store.create_task(&plain).await.unwrap();
    let fetched = store.get_task(plain.id).await.unwrap();
    assert_eq!(fetched.batch_size, None);
    assert_eq!(fetched.failure_policy, None);

    assert_eq!(store.list_tasks().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_execution_rows_update_independently() {
    let ctx = create_test_context().await;
    let store = &ctx.store;

    let task = Task::new("t", "echo ok");
    store.create_task(&task).await.unwrap();

    let mut rows: Vec<HostExecution> = (0..3)
        .map(|i| HostExecution::pending(task.id, Uuid::new_v4(), i))
        .collect();
    // insert out of order; listing follows position
    for row in rows.iter().rev() {
        store.create_host_execution(row).await.unwrap();
    }

    rows[1].start().unwrap();
    rows[1].complete(7).unwrap();
    store.update_host_execution(&rows[1]).await.unwrap();

    let listed = store.list_host_executions(task.id).await.unwrap();
    assert_eq!(listed.len(), 3);
    assert_eq!(listed[0].status, HostStatus::Pending);
    assert_eq!(listed[1].status, HostStatus::Failed);
    assert_eq!(listed[1].exit_code, Some(7));
    assert!(listed[1].started_at.is_some());
    assert!(listed[1].finished_at.is_some());
    assert_eq!(listed[2].status, HostStatus::Pending);
}

#[tokio::test]
async fn test_update_missing_execution() {
    let ctx = create_test_context().await;
    let row = HostExecution::pending(Uuid::new_v4(), Uuid::new_v4(), 0);
    assert!(matches!(
        ctx.store.update_host_execution(&row).await,
        Err(Error::ExecutionNotFound(_))
    ));
}

#[tokio::test]
async fn test_missing_parent_directories_are_created() {
    let dir = TempDir::new().unwrap();
    let parent = dir.path().join("a").join("b");
    assert!(!parent.exists());

    let store = SqliteStore::from_path(&parent.join("fleetops.db")).await.unwrap();
    assert!(parent.is_dir());
    assert!(store.list_hosts().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_reopen_keeps_records() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fleetops.db");

    let task = Task::new("persist", "true");
    {
        let store = SqliteStore::from_path(&path).await.unwrap();
        store.create_task(&task).await.unwrap();
    }

    let store = SqliteStore::from_path(&path).await.unwrap();
    assert_eq!(store.get_task(task.id).await.unwrap().name, "persist");
}
