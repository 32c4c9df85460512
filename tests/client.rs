//! End-to-end tests for the client wrapper, driven against a mock SDK.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use supernet_rs::{
    Balance, ClientConfig, ClientEvent, ConnectionStatus, ModelInfo, Network, ProjectEvent,
    ProjectHandle, ProjectParams, ProjectRequest, Result, RetryOptions, SdkFactory, SizePreset,
    SupernetClient, SupernetError, SupernetSdk,
};

// ── Mock SDK ────────────────────────────────────────────────────────

#[derive(Clone)]
struct MockPlan {
    login_failures: u32,
    login_error: String,
    login_delay: Duration,
    create_failures: u32,
    completion_delay: Duration,
    image_urls: Vec<String>,
    models: Vec<ModelInfo>,
    emit_job_events: bool,
}

impl Default for MockPlan {
    fn default() -> Self {
        Self {
            login_failures: 0,
            login_error: "network unreachable".into(),
            login_delay: Duration::from_millis(10),
            create_failures: 0,
            completion_delay: Duration::from_millis(50),
            image_urls: vec!["https://cdn.example/img-0.png".into()],
            models: vec![model("flux1-schnell", 12)],
            emit_job_events: false,
        }
    }
}

fn model(id: &str, workers: u32) -> ModelInfo {
    ModelInfo {
        id: id.into(),
        name: id.to_uppercase(),
        worker_count: workers,
    }
}

#[derive(Default)]
struct Counters {
    logins: AtomicU32,
    creates: AtomicU32,
    login_failures_left: AtomicU32,
    create_failures_left: AtomicU32,
}

struct MockSdk {
    plan: MockPlan,
    counters: Arc<Counters>,
}

#[async_trait]
impl SupernetSdk for MockSdk {
    async fn login(&self, _username: &str, _password: &str) -> Result<()> {
        self.counters.logins.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.plan.login_delay).await;
        let left = &self.counters.login_failures_left;
        if left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(SupernetError::Unknown {
                message: self.plan.login_error.clone(),
            });
        }
        Ok(())
    }

    async fn wait_for_models(&self) -> Result<()> {
        Ok(())
    }

    async fn available_models(&self) -> Result<Vec<ModelInfo>> {
        Ok(self.plan.models.clone())
    }

    async fn refresh_balance(&self) -> Result<Balance> {
        Ok(Balance {
            spark: 100.0,
            sogni: 5.0,
        })
    }

    async fn size_presets(&self, _network: Network, _model_id: &str) -> Result<Vec<SizePreset>> {
        Ok(vec![SizePreset {
            id: "square".into(),
            label: "Square 1:1".into(),
            width: 1024,
            height: 1024,
        }])
    }

    async fn create_project(&self, _params: ProjectParams) -> Result<Arc<dyn ProjectHandle>> {
        let n = self.counters.creates.fetch_add(1, Ordering::SeqCst);
        let left = &self.counters.create_failures_left;
        if left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(SupernetError::Unknown {
                message: "no workers picked up the project".into(),
            });
        }

        let (tx, _) = broadcast::channel(64);
        if self.plan.emit_job_events {
            let tx = tx.clone();
            let project_id = format!("project-{n}");
            let image_url = self.plan.image_urls.first().cloned();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                let _ = tx.send(ProjectEvent::Progress(supernet_rs::ProgressUpdate {
                    project_id: project_id.clone(),
                    current_step: 10,
                    total_steps: 20,
                }));
                let _ = tx.send(ProjectEvent::JobCompleted(supernet_rs::JobInfo {
                    project_id,
                    job_id: "job-0".into(),
                    image_url,
                    error: None,
                }));
            });
        }

        Ok(Arc::new(MockHandle {
            id: format!("project-{n}"),
            tx,
            delay: self.plan.completion_delay,
            urls: self.plan.image_urls.clone(),
        }))
    }

    async fn close(&self) {}
}

struct MockHandle {
    id: String,
    tx: broadcast::Sender<ProjectEvent>,
    delay: Duration,
    urls: Vec<String>,
}

#[async_trait]
impl ProjectHandle for MockHandle {
    fn id(&self) -> &str {
        &self.id
    }

    fn subscribe(&self) -> broadcast::Receiver<ProjectEvent> {
        self.tx.subscribe()
    }

    async fn wait_for_completion(&self) -> Result<Vec<String>> {
        tokio::time::sleep(self.delay).await;
        Ok(self.urls.clone())
    }
}

fn mock_factory(plan: MockPlan) -> (SdkFactory, Arc<Counters>) {
    let counters = Arc::new(Counters {
        login_failures_left: AtomicU32::new(plan.login_failures),
        create_failures_left: AtomicU32::new(plan.create_failures),
        ..Default::default()
    });
    let shared = Arc::clone(&counters);
    let factory: SdkFactory = Arc::new(move |_config: &ClientConfig| {
        Arc::new(MockSdk {
            plan: plan.clone(),
            counters: Arc::clone(&shared),
        }) as Arc<dyn SupernetSdk>
    });
    (factory, counters)
}

fn config() -> ClientConfig {
    ClientConfig::builder("artist", "hunter2")
        .with_auto_connect(false)
        .with_reconnect(false)
        .with_reconnect_interval(Duration::from_millis(100))
        .build()
}

async fn client_with(plan: MockPlan, config: ClientConfig) -> (SupernetClient, Arc<Counters>) {
    let (factory, counters) = mock_factory(plan);
    let client = SupernetClient::with_sdk_factory(config, factory)
        .await
        .expect("client construction failed");
    (client, counters)
}

// ── Construction & connection lifecycle ─────────────────────────────

#[tokio::test]
async fn test_missing_credentials_fail_before_any_network() {
    let (factory, counters) = mock_factory(MockPlan::default());
    let bad = ClientConfig::builder("", "hunter2").build(); // auto_connect on
    let err = SupernetClient::with_sdk_factory(bad, factory)
        .await
        .expect_err("construction should fail");
    assert_eq!(err.code(), "validation_error");
    assert_eq!(counters.logins.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_disconnect_on_never_connected_client() {
    let (client, _) = client_with(MockPlan::default(), config()).await;
    client.disconnect().await;
    assert!(!client.is_connected());
    assert_eq!(client.connection_state().status, ConnectionStatus::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_connects_share_one_handshake() {
    let plan = MockPlan {
        login_delay: Duration::from_millis(200),
        ..Default::default()
    };
    let (client, counters) = client_with(plan, config()).await;

    let (a, b) = tokio::join!(client.connect(), client.connect());
    assert!(a.is_ok());
    assert!(b.is_ok());
    assert_eq!(counters.logins.load(Ordering::SeqCst), 1);
    assert!(client.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_connect_failure_is_shared() {
    let plan = MockPlan {
        login_failures: u32::MAX,
        login_error: "bad password".into(),
        login_delay: Duration::from_millis(200),
        ..Default::default()
    };
    let (client, counters) = client_with(plan, config()).await;

    let (a, b) = tokio::join!(client.connect(), client.connect());
    assert_eq!(a.unwrap_err().code(), "authentication_error");
    assert_eq!(b.unwrap_err().code(), "authentication_error");
    assert_eq!(counters.logins.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_sequential_connects_are_noops() {
    let (client, counters) = client_with(MockPlan::default(), config()).await;
    client.connect().await.unwrap();
    client.connect().await.unwrap();
    assert_eq!(counters.logins.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_connected_state_snapshot() {
    let (client, _) = client_with(MockPlan::default(), config()).await;
    client.connect().await.unwrap();

    let state = client.connection_state();
    assert_eq!(state.status, ConnectionStatus::Connected);
    assert!(state.is_connected);
    assert!(!state.is_connecting);
    assert_eq!(state.reconnect_attempts, 0);
    assert!(state.connected_at.is_some());
    assert!(state.last_error.is_none());
}

#[tokio::test]
async fn test_auth_failure_classification() {
    let plan = MockPlan {
        login_failures: u32::MAX,
        login_error: "invalid credentials".into(),
        ..Default::default()
    };
    let (client, _) = client_with(plan, config()).await;
    let err = client.connect().await.unwrap_err();
    assert_eq!(err.code(), "authentication_error");
    assert_eq!(err.status_code(), Some(401));
    assert_eq!(client.connection_state().status, ConnectionStatus::Failed);
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_attempts_increment_at_fixed_interval() {
    let plan = MockPlan {
        login_failures: u32::MAX,
        login_error: "network down".into(),
        login_delay: Duration::ZERO,
        ..Default::default()
    };
    let interval = Duration::from_millis(100);
    let reconnecting_config = ClientConfig::builder("artist", "hunter2")
        .with_auto_connect(false)
        .with_reconnect(true)
        .with_reconnect_interval(interval)
        .build();
    let (client, _) = client_with(plan, reconnecting_config).await;

    let mut events = client.subscribe();
    let err = client.connect().await.unwrap_err();
    assert_eq!(err.code(), "connection_error");

    let mut observed = Vec::new();
    while observed.len() < 4 {
        match events.recv().await.unwrap() {
            ClientEvent::Reconnecting { attempt } => {
                observed.push((attempt, tokio::time::Instant::now()));
            }
            _ => continue,
        }
    }

    let attempts: Vec<u32> = observed.iter().map(|(attempt, _)| *attempt).collect();
    assert_eq!(attempts, vec![1, 2, 3, 4]);

    // Attempts are spaced by exactly the configured interval, with no
    // exponential growth between them.
    for pair in observed.windows(2) {
        let gap = pair[1].1 - pair[0].1;
        assert_eq!(gap, interval, "attempt {} fired after {:?}", pair[1].0, gap);
    }

    client.disconnect().await;
    assert_eq!(client.connection_state().status, ConnectionStatus::Disconnected);
}

#[tokio::test]
async fn test_operations_auto_connect() {
    let (client, counters) = client_with(MockPlan::default(), config()).await;
    let balance = client.get_balance().await.unwrap();
    assert_eq!(balance.spark, 100.0);
    assert_eq!(counters.logins.load(Ordering::SeqCst), 1);
    assert!(client.is_connected());
}

// ── Models ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_get_model_by_id() {
    let plan = MockPlan {
        models: vec![model("flux1-schnell", 12), model("sdxl-turbo", 3)],
        ..Default::default()
    };
    let (client, _) = client_with(plan, config()).await;
    let m = client.get_model("sdxl-turbo").await.unwrap();
    assert_eq!(m.name, "SDXL-TURBO");
}

#[tokio::test]
async fn test_get_model_not_found() {
    let (client, _) = client_with(MockPlan::default(), config()).await;
    let err = client.get_model("no-such-model").await.unwrap_err();
    assert_eq!(err.code(), "model_not_found");
    assert_eq!(err.status_code(), Some(404));
    assert_eq!(err.info().details.unwrap()["modelId"], "no-such-model");
}

#[tokio::test]
async fn test_most_popular_model_uses_worker_count() {
    let plan = MockPlan {
        models: vec![model("a", 3), model("b", 42), model("c", 7)],
        ..Default::default()
    };
    let (client, _) = client_with(plan, config()).await;
    assert_eq!(client.most_popular_model().await.unwrap().id, "b");
}

#[tokio::test]
async fn test_size_presets() {
    let (client, _) = client_with(MockPlan::default(), config()).await;
    let presets = client
        .size_presets(Network::Fast, "flux1-schnell")
        .await
        .unwrap();
    assert_eq!(presets[0].width, 1024);
}

// ── Projects ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_create_project_validation_precedes_network() {
    let (client, counters) = client_with(MockPlan::default(), config()).await;
    let request = ProjectRequest::new("flux1-schnell", "a cat").number_of_images(11);
    let err = client.create_project(request).await.unwrap_err();
    assert_eq!(err.code(), "validation_error");
    assert_eq!(counters.logins.load(Ordering::SeqCst), 0);
    assert_eq!(counters.creates.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_create_project_success() {
    let plan = MockPlan {
        image_urls: vec!["https://cdn.example/a.png".into(), "https://cdn.example/b.png".into()],
        ..Default::default()
    };
    let (client, _) = client_with(plan, config()).await;

    let result = client
        .create_project(ProjectRequest::new("flux1-schnell", "a cat").number_of_images(2))
        .await
        .unwrap();
    assert!(result.completed);
    assert_eq!(result.image_urls.unwrap().len(), 2);
    assert!(result.error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_no_wait_returns_before_completion() {
    let plan = MockPlan {
        completion_delay: Duration::from_secs(600),
        ..Default::default()
    };
    let (client, _) = client_with(plan, config()).await;

    let result = client
        .create_project(ProjectRequest::new("flux1-schnell", "a cat").no_wait())
        .await
        .unwrap();
    assert!(!result.completed);
    assert!(result.image_urls.is_none());
    assert_eq!(result.project.id(), "project-0");
}

#[tokio::test(start_paused = true)]
async fn test_completion_timeout_keeps_timeout_classification() {
    let plan = MockPlan {
        completion_delay: Duration::from_secs(600),
        ..Default::default()
    };
    let (client, _) = client_with(plan, config()).await;
    client.connect().await.unwrap();

    let mut events = client.subscribe();
    let request =
        ProjectRequest::new("flux1-schnell", "a cat").timeout(Duration::from_secs(1));
    let err = client.create_project(request).await.unwrap_err();

    match &err {
        SupernetError::Timeout { duration } => assert_eq!(*duration, Duration::from_secs(1)),
        other => panic!("expected timeout, got {other:?}"),
    }

    // The project-failed event keeps the precise timeout code.
    loop {
        match events.recv().await.unwrap() {
            ClientEvent::ProjectFailed(info) => {
                assert_eq!(info.code, "timeout_error");
                assert_eq!(info.details.unwrap()["timeoutMs"], 1000);
                break;
            }
            _ => continue,
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_project_events_fan_out_to_callbacks_and_stream() {
    let plan = MockPlan {
        emit_job_events: true,
        completion_delay: Duration::from_millis(100),
        ..Default::default()
    };
    let (client, _) = client_with(plan, config()).await;
    client.connect().await.unwrap();

    let progress_calls = Arc::new(AtomicU32::new(0));
    let job_calls = Arc::new(AtomicU32::new(0));
    let p = Arc::clone(&progress_calls);
    let j = Arc::clone(&job_calls);

    let mut events = client.subscribe();
    let request = ProjectRequest::new("flux1-schnell", "a cat")
        .on_progress(move |_| {
            p.fetch_add(1, Ordering::SeqCst);
        })
        .on_job_completed(move |job| {
            assert_eq!(job.job_id, "job-0");
            j.fetch_add(1, Ordering::SeqCst);
        });

    let result = client.create_project(request).await.unwrap();
    assert!(result.completed);

    // Both the caller callbacks and the wrapper events fired.
    let mut saw_created = false;
    let mut saw_progress = false;
    let mut saw_job = false;
    let mut saw_completed = false;
    while !(saw_created && saw_progress && saw_job && saw_completed) {
        match events.recv().await.unwrap() {
            ClientEvent::ProjectCreated { project_id } => {
                assert_eq!(project_id, "project-0");
                saw_created = true;
            }
            ClientEvent::ProjectProgress(update) => {
                assert_eq!(update.total_steps, 20);
                saw_progress = true;
            }
            ClientEvent::JobCompleted(_) => saw_job = true,
            ClientEvent::ProjectCompleted { image_urls, .. } => {
                assert_eq!(image_urls.len(), 1);
                saw_completed = true;
            }
            _ => {}
        }
    }
    assert_eq!(progress_calls.load(Ordering::SeqCst), 1);
    assert_eq!(job_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_create_project_with_retry_recovers() {
    let plan = MockPlan {
        create_failures: 2,
        ..Default::default()
    };
    let (client, counters) = client_with(plan, config()).await;

    let retries = Arc::new(AtomicU32::new(0));
    let r = Arc::clone(&retries);
    let options = RetryOptions::default()
        .with_max_attempts(3)
        .with_initial_delay(Duration::from_millis(10));

    let result = client
        .create_project_with_retry(
            ProjectRequest::new("flux1-schnell", "a cat"),
            &options,
            move |_, _| {
                r.fetch_add(1, Ordering::SeqCst);
            },
        )
        .await
        .unwrap();

    assert!(result.completed);
    assert_eq!(retries.load(Ordering::SeqCst), 2);
    assert_eq!(counters.creates.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_create_project_with_retry_exhausts() {
    let plan = MockPlan {
        create_failures: u32::MAX,
        ..Default::default()
    };
    let (client, counters) = client_with(plan, config()).await;

    let options = RetryOptions::default()
        .with_max_attempts(2)
        .with_initial_delay(Duration::from_millis(10));
    let err = client
        .create_project_with_retry(
            ProjectRequest::new("flux1-schnell", "a cat"),
            &options,
            |_, _| {},
        )
        .await
        .unwrap_err();

    assert_eq!(err.code(), "project_error");
    assert_eq!(counters.creates.load(Ordering::SeqCst), 2);
}
