//! The control loop.
//!
//! Accepted notifications update the readiness registry. When a scene
//! becomes ready and is not already admitted, it is admitted in the same
//! critical section and dispatched to the worker pool. Keys are released
//! after the pipeline finishes, but no earlier than the cool-down.

mod eviction;

pub use eviction::{release_after_cooldown, release_after_max_hold, remaining_cooldown};

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::ancillary::AncillaryRefresher;
use crate::config::Config;
use crate::listener::Arrival;
use crate::metrics::{ACTIVE_JOBS, NOTIFICATIONS_TOTAL, READINESS_ENTRIES, SCENES_DISPATCHED};
use crate::pipeline::PipelineExecutor;
use crate::registry::{register_arrival, FileCheck, ReadinessEntry, SceneRegistries};
use crate::scene::{Platform, SceneDescriptor, SceneKey};

/// A scene admitted for processing.
#[derive(Debug, Clone)]
pub struct Admission {
    pub scene: SceneDescriptor,
    pub admitted_at: DateTime<Utc>,
}

/// What the control loop did with a notification.
#[derive(Debug, Clone)]
pub enum ArrivalOutcome {
    /// Platform not processed.
    Rejected,
    /// Recorded (or ignored), but the scene still lacks files.
    NotReady,
    /// The scene key is admitted already.
    Duplicate,
    /// The scene was admitted and should be dispatched.
    Dispatched(Admission),
}

impl ArrivalOutcome {
    fn label(&self) -> &'static str {
        match self {
            Self::Rejected => "rejected",
            Self::NotReady => "not_ready",
            Self::Duplicate => "duplicate",
            Self::Dispatched(_) => "dispatched",
        }
    }
}

pub(crate) fn update_gauges(registries: &SceneRegistries) {
    READINESS_ENTRIES.set(registries.readiness.len() as i64);
    ACTIVE_JOBS.set(registries.jobs.len() as i64);
}

fn describe(key: &SceneKey, arrival: &Arrival, entry: &ReadinessEntry) -> Option<SceneDescriptor> {
    let notification = &arrival.notification;
    Some(SceneDescriptor {
        key: key.clone(),
        platform: entry.platform,
        orbit_number: notification.orbit_number,
        start_time: notification.start_time,
        end_time: notification.end_time,
        sensors: notification.sensors.clone(),
        primary_file: entry.primary.clone()?,
        auxiliary_file: entry.auxiliary.clone(),
    })
}

/// Owns the registries and dispatches ready scenes.
pub struct Controller {
    config: Arc<Config>,
    registries: Arc<RwLock<SceneRegistries>>,
    executor: Arc<PipelineExecutor>,
    refresher: Option<Arc<AncillaryRefresher>>,
    workers: Arc<Semaphore>,
}

impl Controller {
    pub fn new(config: Arc<Config>, executor: PipelineExecutor) -> Self {
        let workers = Arc::new(Semaphore::new(config.runner.max_parallel_scenes.max(1)));
        Self {
            config,
            registries: Arc::new(RwLock::new(SceneRegistries::new())),
            executor: Arc::new(executor),
            refresher: None,
            workers,
        }
    }

    /// Checks the navigation helper files before every launch.
    pub fn with_refresher(mut self, refresher: Arc<AncillaryRefresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    /// Shared registries, for status reporting.
    pub fn registries(&self) -> Arc<RwLock<SceneRegistries>> {
        Arc::clone(&self.registries)
    }

    /// Records an arrival and admits its scene once ready.
    pub async fn handle_arrival(&self, arrival: &Arrival) -> ArrivalOutcome {
        let outcome = self.admit(arrival).await;
        NOTIFICATIONS_TOTAL.with_label_values(&[outcome.label()]).inc();
        outcome
    }

    async fn admit(&self, arrival: &Arrival) -> ArrivalOutcome {
        let notification = &arrival.notification;
        if Platform::from_name(&notification.platform_name).is_none() {
            debug!("Platform {} not supported yet", notification.platform_name);
            return ArrivalOutcome::Rejected;
        }
        let key = SceneKey::new(
            &notification.platform_name,
            notification.orbit_number,
            notification.start_time,
        );

        // I/O stays outside the critical section.
        let check = FileCheck::gather(notification, arrival.on_this_host).await;

        let mut registries = self.registries.write().await;
        if registries.jobs.already_running(&key) {
            debug!("Scene {} processed recently, ignoring", key);
            return ArrivalOutcome::Duplicate;
        }

        let ready = register_arrival(
            notification,
            &mut registries.readiness,
            &key,
            &self.config.naming,
            check,
        );
        if !ready {
            update_gauges(&registries);
            return ArrivalOutcome::NotReady;
        }

        let Some(scene) = registries
            .readiness
            .get(&key)
            .and_then(|entry| describe(&key, arrival, entry))
        else {
            warn!("Scene {} reported ready without a primary file", key);
            return ArrivalOutcome::NotReady;
        };

        let admitted_at = Utc::now();
        registries.jobs.admit(&key, admitted_at);
        update_gauges(&registries);
        info!("Ready to run {}", key);

        ArrivalOutcome::Dispatched(Admission { scene, admitted_at })
    }

    /// Runs an admitted scene on the worker pool and schedules its release.
    pub fn dispatch(
        &self,
        admission: Admission,
        input: Value,
    ) -> impl Future<Output = ()> + Send + 'static {
        let executor = Arc::clone(&self.executor);
        let refresher = self.refresher.clone();
        let workers = Arc::clone(&self.workers);
        let registries = Arc::clone(&self.registries);
        let cooldown = Duration::from_secs(self.config.runner.cooldown_secs);
        let max_hold = Duration::from_secs(self.config.runner.max_hold_secs);

        SCENES_DISPATCHED.inc();
        let Admission { scene, admitted_at } = admission;

        async move {
            let key = scene.key.clone();
            let mut hold_timer = None;
            match workers.acquire_owned().await {
                Ok(permit) => {
                    // Waiting for a worker does not count against the hold.
                    hold_timer = Some(release_after_max_hold(
                        Arc::clone(&registries),
                        key.clone(),
                        admitted_at,
                        max_hold,
                    ));

                    if let Some(refresher) = refresher {
                        if !refresher.ensure_fresh().await {
                            warn!("Navigation helper files are not fresh, processing anyway");
                        }
                    }

                    // A panicking pipeline ends its own task only.
                    let task = tokio::spawn(async move {
                        let _ = executor.run(&scene, &input).await;
                    });
                    if let Err(e) = task.await {
                        error!("Pipeline task for {} ended abnormally: {}", key, e);
                    }
                    drop(permit);
                }
                Err(e) => error!("Worker pool closed, {} not processed: {}", key, e),
            }

            release_after_cooldown(registries, key, admitted_at, cooldown, hold_timer);
        }
    }

    /// Consumes arrivals until every listener is gone, then waits for
    /// running pipelines to finish.
    pub async fn run(self, mut rx: mpsc::Receiver<Arrival>) {
        info!(
            "Control loop started, {} parallel scene(s)",
            self.config.runner.max_parallel_scenes
        );
        let mut pipelines = JoinSet::new();

        loop {
            tokio::select! {
                arrival = rx.recv() => {
                    let Some(arrival) = arrival else { break };
                    if let ArrivalOutcome::Dispatched(admission) = self.handle_arrival(&arrival).await {
                        info!(
                            "Level-0 to level-1 processing of {} dispatched, start time = {}",
                            admission.scene.key, admission.scene.start_time
                        );
                        pipelines.spawn(self.dispatch(admission, arrival.message.data));
                    }
                }
                Some(joined) = pipelines.join_next(), if !pipelines.is_empty() => {
                    if let Err(e) = joined {
                        error!("Dispatch task failed: {}", e);
                    }
                }
            }
        }

        if !pipelines.is_empty() {
            info!("Waiting for {} running pipeline(s)", pipelines.len());
        }
        while let Some(joined) = pipelines.join_next().await {
            if let Err(e) = joined {
                error!("Dispatch task failed: {}", e);
            }
        }
        info!("Control loop stopped");
    }
}
