use std::sync::{Arc, Mutex};
use std::time::Duration;

use scheduler_domain::entities::{
    MasterServerMetadata, ServerStatus, WorkerGroup, WorkerServerMetadata,
};
use scheduler_domain::events::{EventType, RegistryEvent};
use scheduler_domain::ports::RegistryClient;
use scheduler_master::cluster::{
    ClusterSubscriptionAdapter, MasterClusters, WorkerClusters, WorkerGroupChangeNotifier,
    WorkerGroupListener,
};
use scheduler_master::slot_manager::MasterSlotManager;
use scheduler_testing_utils::{
    master_heartbeat_json, worker_group, worker_heartbeat_json, MockRegistryClient,
    MockWorkerGroupRepository, TestEnv,
};

const MASTER_PATH: &str = "/nodes/master";
const WORKER_PATH: &str = "/nodes/worker";

async fn publish_master(registry: &MockRegistryClient, event_type: EventType, host: &str, status: ServerStatus) {
    registry
        .publish(RegistryEvent::new(
            MASTER_PATH,
            event_type,
            master_heartbeat_json(host, 5678, status),
        ))
        .await;
}

async fn publish_worker(registry: &MockRegistryClient, event_type: EventType, host: &str) {
    registry
        .publish(RegistryEvent::new(
            WORKER_PATH,
            event_type,
            worker_heartbeat_json(host, 1234, ServerStatus::Normal),
        ))
        .await;
}

#[derive(Default)]
struct RecordingGroupListener {
    calls: Mutex<Vec<(&'static str, Vec<String>)>>,
}

impl RecordingGroupListener {
    fn record(&self, kind: &'static str, groups: &[WorkerGroup]) {
        let names = groups.iter().map(|group| group.name.clone()).collect();
        self.calls.lock().unwrap().push((kind, names));
    }

    fn calls(&self) -> Vec<(&'static str, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

impl WorkerGroupListener for RecordingGroupListener {
    fn on_worker_group_add(&self, groups: &[WorkerGroup]) {
        self.record("add", groups);
    }

    fn on_worker_group_delete(&self, groups: &[WorkerGroup]) {
        self.record("delete", groups);
    }

    fn on_worker_group_change(&self, groups: &[WorkerGroup]) {
        self.record("change", groups);
    }
}

struct PanickingGroupListener;

impl WorkerGroupListener for PanickingGroupListener {
    fn on_worker_group_add(&self, _groups: &[WorkerGroup]) {
        panic!("listener failure");
    }
}

#[tokio::test]
async fn test_master_heartbeats_drive_slot_rebalance() {
    let registry = MockRegistryClient::new();
    let master_clusters = Arc::new(MasterClusters::new());
    let slot_manager = MasterSlotManager::register("10.0.0.2:5678", &master_clusters);
    registry
        .subscribe(
            MASTER_PATH,
            Arc::new(ClusterSubscriptionAdapter::<MasterServerMetadata>::new(
                master_clusters.clone(),
            )),
        )
        .await
        .unwrap();
    assert!(!slot_manager.check_slot_valid());

    publish_master(&registry, EventType::Add, "10.0.0.1", ServerStatus::Normal).await;
    publish_master(&registry, EventType::Add, "10.0.0.2", ServerStatus::Normal).await;
    publish_master(&registry, EventType::Add, "10.0.0.3", ServerStatus::Normal).await;
    publish_master(&registry, EventType::Add, "10.0.0.4", ServerStatus::Busy).await;

    assert_eq!(master_clusters.len(), 4);
    assert_eq!(master_clusters.get_normal_servers().len(), 3);
    assert_eq!(slot_manager.get_slot_snapshot().total_slots, 3);
    assert_eq!(slot_manager.get_current_master_slot(), 1);

    publish_master(&registry, EventType::Remove, "10.0.0.1", ServerStatus::Normal).await;
    assert_eq!(slot_manager.get_total_master_slots(), 2);
    assert_eq!(slot_manager.get_current_master_slot(), 0);

    // 自身变为 BUSY 后退出健康列表
    publish_master(&registry, EventType::Update, "10.0.0.2", ServerStatus::Busy).await;
    assert_eq!(slot_manager.get_current_master_slot(), -1);
    assert!(!slot_manager.check_slot_valid());

    publish_master(&registry, EventType::Update, "10.0.0.2", ServerStatus::Normal).await;
    assert!(slot_manager.check_slot_valid());
}

#[tokio::test]
async fn test_malformed_heartbeat_does_not_break_subscription() {
    let registry = MockRegistryClient::new();
    let master_clusters = Arc::new(MasterClusters::new());
    registry
        .subscribe(
            MASTER_PATH,
            Arc::new(ClusterSubscriptionAdapter::<MasterServerMetadata>::new(
                master_clusters.clone(),
            )),
        )
        .await
        .unwrap();

    registry
        .publish(RegistryEvent::new(MASTER_PATH, EventType::Add, "{not json"))
        .await;
    publish_master(&registry, EventType::Add, "10.0.0.1", ServerStatus::Normal).await;

    assert_eq!(master_clusters.addresses(), vec!["10.0.0.1:5678".to_string()]);
}

#[tokio::test]
async fn test_worker_groups_follow_table_and_membership() {
    let registry = MockRegistryClient::new();
    let worker_clusters = Arc::new(WorkerClusters::new());
    registry
        .subscribe(
            WORKER_PATH,
            Arc::new(ClusterSubscriptionAdapter::<WorkerServerMetadata>::new(
                worker_clusters.clone(),
            )),
        )
        .await
        .unwrap();
    publish_worker(&registry, EventType::Add, "10.0.1.1").await;
    publish_worker(&registry, EventType::Add, "10.0.1.2").await;

    let repo = MockWorkerGroupRepository::new();
    repo.set_worker_groups(vec![worker_group(
        1,
        "gpu",
        "10.0.1.1:1234,10.0.1.9:1234",
    )]);
    let notifier = Arc::new(WorkerGroupChangeNotifier::new(
        Arc::new(repo.clone()),
        Duration::from_secs(60),
    ));
    notifier.subscribe_worker_groups_change(worker_clusters.clone());
    notifier.detect_worker_group_changes().await.unwrap();

    assert!(worker_clusters.contains_worker_group("gpu"));
    assert_eq!(
        worker_clusters.get_worker_server_address_by_group("gpu"),
        vec!["10.0.1.1:1234".to_string()]
    );
    assert_eq!(
        worker_clusters.get_worker_server_address_by_group("default").len(),
        2
    );

    publish_worker(&registry, EventType::Remove, "10.0.1.1").await;
    assert!(worker_clusters
        .get_worker_server_address_by_group("gpu")
        .is_empty());

    repo.set_worker_groups(vec![]);
    notifier.detect_worker_group_changes().await.unwrap();
    assert!(!worker_clusters.contains_worker_group("gpu"));
}

#[tokio::test]
async fn test_notifier_reports_add_delete_change_in_order() {
    let repo = MockWorkerGroupRepository::new();
    let notifier = WorkerGroupChangeNotifier::new(Arc::new(repo.clone()), Duration::from_secs(60));
    let listener = Arc::new(RecordingGroupListener::default());
    notifier.subscribe_worker_groups_change(listener.clone());

    repo.set_worker_groups(vec![
        worker_group(1, "a", "10.0.0.1:1234"),
        worker_group(2, "b", "10.0.0.2:1234"),
    ]);
    notifier.detect_worker_group_changes().await.unwrap();

    repo.set_worker_groups(vec![
        worker_group(1, "a", "10.0.0.1:1234,10.0.0.3:1234"),
        worker_group(3, "c", "10.0.0.4:1234"),
    ]);
    let changes = notifier.detect_worker_group_changes().await.unwrap();
    assert_eq!(changes.added.len(), 1);
    assert_eq!(changes.removed.len(), 1);
    assert_eq!(changes.changed.len(), 1);

    assert_eq!(
        listener.calls(),
        vec![
            ("add", vec!["a".to_string(), "b".to_string()]),
            ("add", vec!["c".to_string()]),
            ("delete", vec!["b".to_string()]),
            ("change", vec!["a".to_string()]),
        ]
    );

    let unchanged = notifier.detect_worker_group_changes().await.unwrap();
    assert!(unchanged.is_empty());
    assert_eq!(listener.calls().len(), 4);
}

#[tokio::test]
async fn test_panicking_group_listener_does_not_skip_others() {
    let repo = MockWorkerGroupRepository::new();
    let notifier = Arc::new(WorkerGroupChangeNotifier::new(
        Arc::new(repo.clone()),
        Duration::from_millis(30),
    ));
    let listener = Arc::new(RecordingGroupListener::default());
    notifier.subscribe_worker_groups_change(Arc::new(PanickingGroupListener));
    notifier.subscribe_worker_groups_change(listener.clone());

    repo.set_worker_groups(vec![worker_group(1, "a", "10.0.0.1:1234")]);
    let detect = {
        let notifier = notifier.clone();
        tokio::spawn(async move { notifier.detect_worker_group_changes().await })
    };
    let changes = detect.await.unwrap().unwrap();
    assert_eq!(changes.added.len(), 1);
    assert_eq!(listener.calls(), vec![("add", vec!["a".to_string()])]);

    // 周期循环在监听器panic后继续运行
    let handle = notifier.start().await;
    repo.set_worker_groups(vec![
        worker_group(1, "a", "10.0.0.1:1234"),
        worker_group(2, "b", "10.0.0.2:1234"),
    ]);
    let observed = {
        let listener = listener.clone();
        TestEnv::wait_for(
            move || {
                let listener = listener.clone();
                async move { listener.calls().len() == 2 }
            },
            Duration::from_secs(2),
        )
        .await
    };
    assert!(observed);
    assert_eq!(listener.calls()[1], ("add", vec!["b".to_string()]));

    notifier.stop().await;
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("refresh loop should exit after stop")
        .unwrap();
}

#[tokio::test]
async fn test_failed_refresh_keeps_previous_snapshot() {
    let repo = MockWorkerGroupRepository::new();
    let notifier = WorkerGroupChangeNotifier::new(Arc::new(repo.clone()), Duration::from_secs(60));
    let listener = Arc::new(RecordingGroupListener::default());
    notifier.subscribe_worker_groups_change(listener.clone());

    repo.set_worker_groups(vec![worker_group(1, "a", "10.0.0.1:1234")]);
    notifier.detect_worker_group_changes().await.unwrap();

    repo.set_failing(true);
    assert!(notifier.detect_worker_group_changes().await.is_err());
    assert_eq!(listener.calls().len(), 1);

    // 恢复后与失败前的快照比对，不会误报删除
    repo.set_failing(false);
    let changes = notifier.detect_worker_group_changes().await.unwrap();
    assert!(changes.is_empty());
    assert_eq!(listener.calls().len(), 1);
}

#[tokio::test]
async fn test_notifier_start_runs_immediately_and_periodically() {
    let repo = MockWorkerGroupRepository::new();
    repo.set_worker_groups(vec![worker_group(1, "a", "10.0.0.1:1234")]);
    let notifier = Arc::new(WorkerGroupChangeNotifier::new(
        Arc::new(repo.clone()),
        Duration::from_millis(30),
    ));
    let listener = Arc::new(RecordingGroupListener::default());
    notifier.subscribe_worker_groups_change(listener.clone());

    let handle = notifier.start().await;
    assert_eq!(listener.calls().len(), 1);

    repo.set_worker_groups(vec![]);
    let observed = {
        let listener = listener.clone();
        TestEnv::wait_for(
            move || {
                let listener = listener.clone();
                async move { listener.calls().len() == 2 }
            },
            Duration::from_secs(2),
        )
        .await
    };
    assert!(observed);
    assert_eq!(listener.calls()[1].0, "delete");

    notifier.stop().await;
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("refresh loop should exit after stop")
        .unwrap();
    assert!(repo.query_calls() >= 2);
}
