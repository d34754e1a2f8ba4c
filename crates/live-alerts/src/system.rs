//! The alert system.
//!
//! [`AlertSystem`] owns the configuration, the category queues, one rotator
//! per category, the binding registry and the four timers (one poll timer and
//! three rotation timers). Hosts create one instance, feed it configuration,
//! start it with an [`EventSource`] and stop it on shutdown.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::binding::SceneBindingRegistry;
use crate::config::AlertConfig;
use crate::error::{Error, Result};
use crate::event::{Category, CategoryMap, Event};
use crate::events::{AlertEvent, AlertEventBroadcaster};
use crate::poller::Poller;
use crate::presentation::PresentationTarget;
use crate::queue::QueueSet;
use crate::rotator::{Advance, AlertRotator, RotatorState, TickOutcome};
use crate::scheduler::{Scheduler, TimerHandle, TokioScheduler};
use crate::source::EventSource;

type SharedRotator = Arc<Mutex<AlertRotator>>;
type SharedPoller = Arc<tokio::sync::Mutex<Poller>>;

/// Per-category counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryStatus {
    pub enabled: bool,
    pub pending: usize,
    pub state: RotatorState,
    pub shown: u64,
    pub dropped: u64,
    /// Events evicted by the pending cap.
    pub evicted: u64,
}

/// Snapshot of the whole system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemStatus {
    /// Timers are armed.
    pub running: bool,
    /// A source is attached and polled.
    pub polling: bool,
    pub categories: CategoryMap<CategoryStatus>,
}

/// Owns every piece of alert state.
pub struct AlertSystem {
    config: AlertConfig,
    target: Arc<dyn PresentationTarget>,
    registry: Arc<Mutex<SceneBindingRegistry>>,
    queues: QueueSet,
    rotators: CategoryMap<SharedRotator>,
    scheduler: Arc<dyn Scheduler>,
    timers: Vec<TimerHandle>,
    source: Option<Arc<dyn EventSource>>,
    poller: Option<SharedPoller>,
    broadcaster: AlertEventBroadcaster,
}

impl AlertSystem {
    /// Create a stopped system with the default configuration.
    pub fn new(target: Arc<dyn PresentationTarget>) -> Self {
        Self::with_scheduler(target, Arc::new(TokioScheduler::new()))
    }

    pub fn with_scheduler(target: Arc<dyn PresentationTarget>, scheduler: Arc<dyn Scheduler>) -> Self {
        let config = AlertConfig::default();
        let queues = QueueSet::new(config.max_pending_per_category);
        let rotators = CategoryMap::from_fn(|category| {
            Arc::new(Mutex::new(AlertRotator::new(
                category,
                config.category(category).clone(),
                queues.get(category).clone(),
            )))
        });

        let mut registry = SceneBindingRegistry::new();
        registry.relist(target.as_ref());

        Self {
            config,
            target,
            registry: Arc::new(Mutex::new(registry)),
            queues,
            rotators,
            scheduler,
            timers: Vec::new(),
            source: None,
            poller: None,
            broadcaster: AlertEventBroadcaster::new(),
        }
    }

    pub fn config(&self) -> &AlertConfig {
        &self.config
    }

    /// Apply a new configuration.
    ///
    /// An invalid configuration stops the system and is not applied. A valid
    /// one relists the scenes and, when running, hands the new URL and refresh
    /// interval to the source and re-arms the timers with the new periods.
    /// Queues are kept; cursors and the live session are kept unless the URL
    /// changed. Clearing the URL stops polling but not rotation.
    pub fn configure(&mut self, mut config: AlertConfig) -> Result<()> {
        config.fill_defaults();
        if let Err(e) = config.validate() {
            warn!(error = %e, "Invalid configuration, alerts stopped");
            self.stop();
            return Err(e);
        }

        if let Some(source) = &self.source
            && config.polling_configured()
            && let Err(e) = bind_source(source.as_ref(), &config)
        {
            warn!(error = %e, "Invalid configuration, alerts stopped");
            self.stop();
            return Err(e);
        }

        let url_changed =
            config.source_credential_url.trim() != self.config.source_credential_url.trim();
        self.queues.set_cap(config.max_pending_per_category);
        for category in Category::ALL {
            self.rotators
                .get(category)
                .lock()
                .set_config(config.category(category).clone());
        }
        self.config = config;
        self.scene_list_changed();

        if self.is_running() {
            self.sync_poller(url_changed);
            self.disarm();
            self.arm();
        }
        debug!("Configuration applied");
        Ok(())
    }

    /// Arm the timers and start polling `source`.
    ///
    /// When no source URL is configured, only the rotation timers run and
    /// alerts come from [`enqueue`](Self::enqueue) alone. The source is kept
    /// so that configuring a URL later starts polling it.
    pub async fn start(&mut self, source: Option<Arc<dyn EventSource>>) -> Result<()> {
        self.stop();
        if let Err(e) = self.config.validate() {
            warn!(error = %e, "Invalid configuration, alerts not started");
            return Err(e);
        }

        if let Some(source) = source {
            if self.config.polling_configured() {
                if let Err(e) = bind_source(source.as_ref(), &self.config) {
                    warn!(error = %e, "Invalid configuration, alerts not started");
                    return Err(e);
                }

                let mut poller =
                    Poller::new(source.clone(), self.queues.clone(), self.config.skip_backlog);
                if let Err(e) = poller.prime().await {
                    warn!(error = %e, "Could not skip alert backlog, retrying on next poll");
                }
                self.poller = Some(Arc::new(tokio::sync::Mutex::new(poller)));
            }
            self.source = Some(source);
        }
        if self.poller.is_none() {
            info!("Alert polling not configured");
        }

        self.arm();
        info!(
            polling = self.poller.is_some(),
            refresh_secs = self.config.refresh_interval_seconds,
            "Alerts started"
        );
        Ok(())
    }

    /// Disarm every timer, drop the source and hide visible alerts.
    pub fn stop(&mut self) {
        let was_running = self.is_running();
        self.disarm();
        self.poller = None;
        self.source = None;

        for category in Category::ALL {
            let retired = self.rotators.get(category).lock().retire(self.target.as_ref());
            if let Some((event, shown_at)) = retired {
                self.broadcaster.publish(AlertEvent::Retired {
                    category,
                    event,
                    shown_at,
                });
            }
        }

        if was_running {
            info!("Alerts stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        !self.timers.is_empty()
    }

    /// Queue an event directly, bypassing the source.
    pub fn enqueue(&self, event: Event) {
        self.queues.enqueue(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AlertEvent> {
        self.broadcaster.subscribe()
    }

    pub fn queues(&self) -> &QueueSet {
        &self.queues
    }

    pub fn rotator_state(&self, category: Category) -> RotatorState {
        self.rotators.get(category).lock().state()
    }

    pub fn status(&self) -> SystemStatus {
        let categories = CategoryMap::from_fn(|category| {
            let rotator = self.rotators.get(category).lock();
            let queue = self.queues.get(category).lock();
            CategoryStatus {
                enabled: self.config.category(category).enabled,
                pending: queue.len(),
                state: rotator.state(),
                shown: rotator.shown_total(),
                dropped: rotator.dropped_total(),
                evicted: queue.evicted(),
            }
        });

        SystemStatus {
            running: self.is_running(),
            polling: self.poller.is_some(),
            categories,
        }
    }

    /// Relist scenes after the host reports a topology change.
    pub fn scene_list_changed(&self) {
        self.registry.lock().scene_list_changed(self.target.as_ref());
    }

    /// Text sources offered as slot choices.
    pub fn text_sources(&self) -> Vec<String> {
        self.registry.lock().text_sources().map(str::to_string).collect()
    }

    /// Sub-scenes offered as toggle choices.
    pub fn subscenes(&self) -> Vec<String> {
        self.registry.lock().subscenes().map(str::to_string).collect()
    }

    /// Advance one rotator immediately, outside its timer.
    pub fn tick_category(&self, category: Category) -> TickOutcome {
        rotate(
            self.rotators.get(category),
            self.target.as_ref(),
            &self.registry,
            &self.broadcaster,
        )
    }

    /// Run one poll tick immediately. Does nothing without a source.
    pub async fn poll_now(&self) {
        if let Some(poller) = &self.poller {
            poll(poller, &self.broadcaster).await;
        }
    }

    /// Start, stop or restart polling to match the current URL.
    fn sync_poller(&mut self, url_changed: bool) {
        if !self.config.polling_configured() {
            if self.poller.take().is_some() {
                info!("Live Stream API URL cleared, alert polling stopped");
            }
            return;
        }
        let Some(source) = &self.source else {
            return;
        };
        if self.poller.is_none() || url_changed {
            // Cursors and session belong to the old URL's account. The new
            // poller primes on its first tick.
            let poller =
                Poller::new(source.clone(), self.queues.clone(), self.config.skip_backlog);
            self.poller = Some(Arc::new(tokio::sync::Mutex::new(poller)));
            info!(source = source.name(), "Alert polling started");
        }
    }

    fn arm(&mut self) {
        if let Some(poller) = &self.poller {
            let poller = poller.clone();
            let broadcaster = self.broadcaster.clone();
            let timer = self.scheduler.schedule(
                "poll",
                self.config.refresh_interval(),
                Box::new(move || {
                    let poller = poller.clone();
                    let broadcaster = broadcaster.clone();
                    async move { poll(&poller, &broadcaster).await }.boxed()
                }),
            );
            self.timers.push(timer);
        }

        for category in Category::ALL {
            let rotator = self.rotators.get(category).clone();
            let target = self.target.clone();
            let registry = self.registry.clone();
            let broadcaster = self.broadcaster.clone();
            let timer = self.scheduler.schedule(
                category.as_str(),
                self.config.category(category).display_period(),
                Box::new(move || {
                    rotate(&rotator, target.as_ref(), &registry, &broadcaster);
                    async {}.boxed()
                }),
            );
            self.timers.push(timer);
        }
    }

    fn disarm(&mut self) {
        for timer in self.timers.drain(..) {
            timer.cancel();
        }
    }
}

impl Drop for AlertSystem {
    fn drop(&mut self) {
        self.disarm();
    }
}

/// Hand the URL and refresh interval to `source`, then check that it can be
/// polled that often.
fn bind_source(source: &dyn EventSource, config: &AlertConfig) -> Result<()> {
    source.apply_settings(&config.source_credential_url, config.refresh_interval())?;
    let min = source.min_poll_interval();
    if config.refresh_interval() <= min {
        return Err(refresh_too_short(config, min));
    }
    Ok(())
}

fn refresh_too_short(config: &AlertConfig, min: Duration) -> Error {
    Error::config(format!(
        "refresh interval of {}s must exceed the source's minimum poll interval of {:.1}s",
        config.refresh_interval_seconds,
        min.as_secs_f64()
    ))
}

fn rotate(
    rotator: &SharedRotator,
    target: &dyn PresentationTarget,
    registry: &Mutex<SceneBindingRegistry>,
    broadcaster: &AlertEventBroadcaster,
) -> TickOutcome {
    let mut rotator = rotator.lock();
    let category = rotator.category();
    let outcome = rotator.tick(target, &mut registry.lock(), Utc::now());

    if let Some((event, shown_at)) = outcome.retired.clone() {
        broadcaster.publish(AlertEvent::Retired {
            category,
            event,
            shown_at,
        });
    }
    match &outcome.advance {
        Advance::Empty => {}
        Advance::Shown(event) => {
            let state = rotator.state();
            broadcaster.publish(AlertEvent::Shown {
                category,
                event: event.clone(),
                scene: rotator.current_scene().unwrap_or_default().to_string(),
                at: state.active_since.unwrap_or_else(Utc::now),
            });
        }
        Advance::Dropped { event, reason } => {
            broadcaster.publish(AlertEvent::Dropped {
                category,
                event: event.clone(),
                reason: reason.clone(),
            });
        }
    }
    outcome
}

async fn poll(poller: &tokio::sync::Mutex<Poller>, broadcaster: &AlertEventBroadcaster) {
    let mut poller = poller.lock().await;
    match poller.tick_logged().await {
        Ok(report) => {
            if report.session_changed {
                broadcaster.publish(AlertEvent::SessionChanged {
                    session: poller.session().cloned(),
                });
            }
            broadcaster.publish(AlertEvent::Polled { report });
        }
        Err(error) => broadcaster.publish(AlertEvent::PollFailed { error }),
    }
}
