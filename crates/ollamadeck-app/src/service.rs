//! The application service.
//!
//! Owns the two ports and the event channel. Every method returns
//! immediately; slow work runs in spawned tasks whose results arrive as
//! [`AppEvent`]s. Exclusivity rules: refreshes are one-per-resource via
//! [`Exclusive`], pulls are one-at-a-time via a session slot.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use ollamadeck_core::{
    CommandOutcome, ModelRunner, PullEvent, PullOutcome, RegistryCatalog, RemoteModel, RunnerError,
    Settings,
};

use crate::events::AppEvent;
use crate::orchestrator::{Exclusive, TaskKey};

/// Why a pull could not be started.
#[derive(Debug, thiserror::Error)]
pub enum PullError {
    /// Only one download may run at a time.
    #[error("a pull is already in progress")]
    AlreadyActive,

    /// The family has no known tags, so there is nothing to pull.
    #[error("no tags found for '{family}'")]
    TagsUnavailable { family: String },

    /// The runner binary could not be launched.
    #[error(transparent)]
    Launch(#[from] RunnerError),
}

/// Bookkeeping for the single in-flight pull.
struct PullSession {
    tag: String,
    cancel: CancellationToken,
}

/// Orchestrates background work over the runner and registry ports and
/// publishes [`AppEvent`]s for the presentation layer.
#[derive(Clone)]
pub struct AppService {
    runner: Arc<dyn ModelRunner>,
    registry: Arc<dyn RegistryCatalog>,
    events: mpsc::UnboundedSender<AppEvent>,
    slots: Arc<Exclusive>,
    /// Last catalog snapshot, kept for synchronous client-side filtering.
    catalog: Arc<Mutex<Vec<RemoteModel>>>,
    pull: Arc<tokio::sync::Mutex<Option<PullSession>>>,
    ps_refresh: Duration,
}

impl AppService {
    /// Build the service and the event receiver for the presentation layer.
    #[must_use]
    pub fn new(
        runner: Arc<dyn ModelRunner>,
        registry: Arc<dyn RegistryCatalog>,
        settings: &Settings,
    ) -> (Self, mpsc::UnboundedReceiver<AppEvent>) {
        let (events, event_rx) = mpsc::unbounded_channel();
        let service = Self {
            runner,
            registry,
            events,
            slots: Arc::new(Exclusive::new()),
            catalog: Arc::new(Mutex::new(Vec::new())),
            pull: Arc::new(tokio::sync::Mutex::new(None)),
            ps_refresh: Duration::from_secs(settings.effective_ps_refresh_secs()),
        };
        (service, event_rx)
    }

    /// Whether the runner binary is usable. Probed once at startup so the
    /// presentation layer can warn before the first refresh fails.
    pub async fn check_runner(&self) -> bool {
        self.runner.check_available().await
    }

    // ── Refreshes ──────────────────────────────────────────────────

    /// Refresh the installed-models snapshot.
    pub fn refresh_installed(&self) {
        let service = self.clone();
        let token = self.slots.begin(TaskKey::List);
        tokio::spawn(async move {
            let result = tokio::select! {
                biased;
                () = token.cancelled() => return,
                result = service.runner.list_installed() => result,
            };
            if token.is_cancelled() {
                return;
            }
            match result {
                Ok(models) => service.publish(AppEvent::InstalledUpdated(models)),
                Err(e) => service.publish(AppEvent::RefreshFailed {
                    resource: "installed",
                    message: e.to_string(),
                }),
            }
        });
    }

    /// Refresh the running-models snapshot.
    pub fn refresh_running(&self) {
        let service = self.clone();
        let token = self.slots.begin(TaskKey::Ps);
        tokio::spawn(async move {
            let result = tokio::select! {
                biased;
                () = token.cancelled() => return,
                result = service.runner.list_running() => result,
            };
            if token.is_cancelled() {
                return;
            }
            match result {
                Ok(models) => service.publish(AppEvent::RunningUpdated(models)),
                Err(e) => service.publish(AppEvent::RefreshFailed {
                    resource: "running",
                    message: e.to_string(),
                }),
            }
        });
    }

    /// Refresh the remote catalog snapshot. Registry faults degrade to an
    /// empty snapshot inside the port, so this never publishes a failure.
    pub fn refresh_catalog(&self) {
        let service = self.clone();
        let token = self.slots.begin(TaskKey::Search);
        tokio::spawn(async move {
            let models = tokio::select! {
                biased;
                () = token.cancelled() => return,
                models = service.registry.search_models() => models,
            };
            if token.is_cancelled() {
                return;
            }
            *service.catalog.lock().unwrap() = models.clone();
            service.publish(AppEvent::CatalogUpdated(models));
        });
    }

    /// Fetch the tags of one model family.
    pub fn fetch_tags(&self, family: impl Into<String>) {
        let service = self.clone();
        let family = family.into();
        let token = self.slots.begin(TaskKey::Tags(family.clone()));
        tokio::spawn(async move {
            let tags = tokio::select! {
                biased;
                () = token.cancelled() => return,
                tags = service.registry.fetch_tags(&family) => tags,
            };
            if token.is_cancelled() {
                return;
            }
            service.publish(AppEvent::TagsFetched { family, tags });
        });
    }

    /// Case-insensitive substring filter over the last catalog snapshot.
    /// Purely local: no network, no events.
    #[must_use]
    pub fn search(&self, filter: &str) -> Vec<RemoteModel> {
        let needle = filter.trim().to_lowercase();
        let catalog = self.catalog.lock().unwrap();
        if needle.is_empty() {
            return catalog.clone();
        }
        catalog
            .iter()
            .filter(|model| model.name.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }

    // ── One-shot commands ──────────────────────────────────────────

    /// Remove an installed model. A successful removal triggers an
    /// installed-models refresh so the snapshot catches up.
    pub fn delete(&self, name: impl Into<String>) {
        let service = self.clone();
        let name = name.into();
        tokio::spawn(async move {
            let outcome = match service.runner.delete(&name).await {
                Ok(outcome) => outcome,
                Err(e) => CommandOutcome {
                    success: false,
                    message: e.to_string(),
                },
            };
            if outcome.success {
                service.refresh_installed();
            }
            service.publish(AppEvent::DeleteFinished {
                name,
                success: outcome.success,
                message: outcome.message,
            });
        });
    }

    /// Unload a running model, refreshing the running snapshot on success.
    pub fn stop(&self, name: impl Into<String>) {
        let service = self.clone();
        let name = name.into();
        tokio::spawn(async move {
            let outcome = match service.runner.stop(&name).await {
                Ok(outcome) => outcome,
                Err(e) => CommandOutcome {
                    success: false,
                    message: e.to_string(),
                },
            };
            if outcome.success {
                service.refresh_running();
            }
            service.publish(AppEvent::StopFinished {
                name,
                success: outcome.success,
                message: outcome.message,
            });
        });
    }

    /// Details blob for one model, verbatim from the runner.
    pub async fn show_details(&self, name: &str) -> String {
        self.runner.show_details(name).await
    }

    /// Drop all cached registry data.
    pub fn flush_cache(&self) {
        self.registry.flush_cache();
    }

    // ── Pull session ───────────────────────────────────────────────

    /// Start downloading `reference` and return the resolved tag.
    ///
    /// A bare family name (no `:`) is resolved through the registry first;
    /// resolution prefers `latest` and fails if the family has no known
    /// tags. Progress and the terminal outcome arrive as events.
    pub async fn start_pull(&self, reference: &str) -> Result<String, PullError> {
        let mut session = self.pull.lock().await;
        if let Some(active) = session.as_ref() {
            debug!(active = %active.tag, "refusing concurrent pull");
            return Err(PullError::AlreadyActive);
        }

        let tag = self.resolve_tag(reference).await?;
        let mut stream = self.runner.pull(&tag).await?;
        info!(tag, "pull started");
        *session = Some(PullSession {
            tag: tag.clone(),
            cancel: stream.cancellation_token(),
        });
        drop(session);

        let service = self.clone();
        let task_tag = tag.clone();
        tokio::spawn(async move {
            // The stream ends without a terminal event only on cancellation.
            let mut outcome = PullOutcome::Cancelled;
            while let Some(event) = stream.next_event().await {
                match event {
                    PullEvent::Progress { line, percent } => {
                        service.publish(AppEvent::PullProgress {
                            tag: task_tag.clone(),
                            line,
                            percent,
                        });
                    }
                    PullEvent::Completed => {
                        outcome = PullOutcome::Completed;
                        break;
                    }
                    PullEvent::Failed { message } => {
                        outcome = PullOutcome::Failed { message };
                        break;
                    }
                }
            }

            service.pull.lock().await.take();
            if outcome == PullOutcome::Completed {
                service.refresh_installed();
            }
            info!(tag = task_tag, outcome = ?outcome, "pull finished");
            service.publish(AppEvent::PullFinished {
                tag: task_tag,
                outcome,
            });
        });

        Ok(tag)
    }

    /// Cancel the active pull, if any. The session's `PullFinished` event
    /// (outcome `Cancelled`) follows once the subprocess is down.
    pub async fn cancel_pull(&self) -> bool {
        let session = self.pull.lock().await;
        match session.as_ref() {
            Some(active) => {
                info!(tag = %active.tag, "cancelling pull");
                active.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Tag of the in-flight pull, if any.
    pub async fn active_pull(&self) -> Option<String> {
        self.pull.lock().await.as_ref().map(|s| s.tag.clone())
    }

    async fn resolve_tag(&self, reference: &str) -> Result<String, PullError> {
        if reference.contains(':') {
            return Ok(reference.to_string());
        }
        let tags = self.registry.fetch_tags(reference).await;
        if tags.is_empty() {
            return Err(PullError::TagsUnavailable {
                family: reference.to_string(),
            });
        }
        let tag = tags
            .iter()
            .find(|t| t.short_label() == "latest")
            .unwrap_or(&tags[0]);
        debug!(family = reference, tag = %tag.tag, "resolved family to tag");
        Ok(tag.tag.clone())
    }

    // ── Background polling ─────────────────────────────────────────

    /// Start the recurring running-models poll. Each tick goes through the
    /// same `ps` slot as manual refreshes, so a manual refresh supersedes a
    /// poll and vice versa. Runs until `shutdown` is cancelled.
    pub fn spawn_ps_poller(&self, shutdown: CancellationToken) {
        let service = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(service.ps_refresh);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    _ = ticker.tick() => service.refresh_running(),
                }
            }
            debug!("ps poller stopped");
        });
    }

    fn publish(&self, event: AppEvent) {
        if self.events.send(event).is_err() {
            warn!("event receiver dropped, discarding event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ollamadeck_core::{
        InstalledModel, ModelTag, PullStream, RunnerResult, RunningModel,
    };
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted runner. Listing sleeps briefly so supersession has a
    /// window to land, and each call returns a distinct marker row.
    struct FakeRunner {
        list_calls: AtomicUsize,
        list_delay: Duration,
        delete_ok: bool,
        pull_script: Vec<PullEvent>,
        /// Keep the pull's event channel open past the script.
        hold_pull_open: bool,
    }

    impl FakeRunner {
        fn new() -> Self {
            Self {
                list_calls: AtomicUsize::new(0),
                list_delay: Duration::from_millis(20),
                delete_ok: true,
                pull_script: vec![],
                hold_pull_open: false,
            }
        }

        fn installed_row(call: usize) -> InstalledModel {
            InstalledModel {
                name: format!("model-from-call-{call}"),
                id: "abc123".to_string(),
                size: "1.0 GB".to_string(),
                modified: "now".to_string(),
            }
        }
    }

    #[async_trait]
    impl ModelRunner for FakeRunner {
        async fn check_available(&self) -> bool {
            true
        }

        async fn list_installed(&self) -> RunnerResult<Vec<InstalledModel>> {
            let call = self.list_calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(self.list_delay).await;
            Ok(vec![Self::installed_row(call)])
        }

        async fn list_running(&self) -> RunnerResult<Vec<RunningModel>> {
            Ok(vec![])
        }

        async fn delete(&self, name: &str) -> RunnerResult<CommandOutcome> {
            Ok(CommandOutcome {
                success: self.delete_ok,
                message: if self.delete_ok {
                    format!("deleted '{name}'")
                } else {
                    format!("Error: model '{name}' not found")
                },
            })
        }

        async fn stop(&self, name: &str) -> RunnerResult<CommandOutcome> {
            Ok(CommandOutcome {
                success: true,
                message: format!("stopped '{name}'"),
            })
        }

        async fn show_details(&self, name: &str) -> String {
            format!("details for {name}")
        }

        async fn pull(&self, _tag: &str) -> RunnerResult<PullStream> {
            let (tx, rx) = mpsc::channel(16);
            let script = self.pull_script.clone();
            let hold = self.hold_pull_open;
            tokio::spawn(async move {
                for event in script {
                    if tx.send(event).await.is_err() {
                        return;
                    }
                }
                if hold {
                    // Simulate a download that never finishes on its own.
                    tx.closed().await;
                }
            });
            Ok(PullStream::new(rx, CancellationToken::new()))
        }
    }

    struct FakeRegistry {
        models: Vec<RemoteModel>,
        tags: HashMap<String, Vec<ModelTag>>,
        flushes: AtomicUsize,
    }

    impl FakeRegistry {
        fn new() -> Self {
            Self {
                models: vec![
                    remote("llama3.2", "Meta's small Llama"),
                    remote("qwen2.5-coder", "Code-specific Qwen"),
                    remote("phi4", "Microsoft's Phi 4"),
                ],
                tags: HashMap::new(),
                flushes: AtomicUsize::new(0),
            }
        }

        fn with_tags(mut self, family: &str, tags: &[&str]) -> Self {
            let tags = tags
                .iter()
                .map(|t| ModelTag {
                    tag: (*t).to_string(),
                    size: "1GB".to_string(),
                })
                .collect();
            self.tags.insert(family.to_string(), tags);
            self
        }
    }

    fn remote(name: &str, description: &str) -> RemoteModel {
        RemoteModel {
            name: name.to_string(),
            sizes: "7b".to_string(),
            description: description.to_string(),
        }
    }

    #[async_trait]
    impl RegistryCatalog for FakeRegistry {
        async fn search_models(&self) -> Vec<RemoteModel> {
            self.models.clone()
        }

        async fn fetch_tags(&self, family: &str) -> Vec<ModelTag> {
            self.tags.get(family).cloned().unwrap_or_default()
        }

        fn flush_cache(&self) {
            self.flushes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn service_with(
        runner: FakeRunner,
        registry: FakeRegistry,
    ) -> (AppService, mpsc::UnboundedReceiver<AppEvent>) {
        AppService::new(
            Arc::new(runner),
            Arc::new(registry),
            &Settings::default(),
        )
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<AppEvent>) -> AppEvent {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for an event")
            .expect("event channel closed")
    }

    async fn assert_no_event(rx: &mut mpsc::UnboundedReceiver<AppEvent>) {
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(rx.try_recv().is_err(), "expected no further events");
    }

    #[tokio::test]
    async fn superseded_refresh_never_delivers() {
        let (service, mut rx) = service_with(FakeRunner::new(), FakeRegistry::new());

        service.refresh_installed();
        // Let the first refresh get in flight before superseding it.
        tokio::time::sleep(Duration::from_millis(5)).await;
        service.refresh_installed();

        // Only the second refresh's snapshot arrives.
        let event = next_event(&mut rx).await;
        let AppEvent::InstalledUpdated(models) = event else {
            panic!("unexpected event: {event:?}");
        };
        assert_eq!(models[0].name, "model-from-call-2");
        assert_no_event(&mut rx).await;
    }

    #[tokio::test]
    async fn lone_refresh_delivers_its_snapshot() {
        let (service, mut rx) = service_with(FakeRunner::new(), FakeRegistry::new());
        service.refresh_installed();
        let event = next_event(&mut rx).await;
        assert_eq!(
            event,
            AppEvent::InstalledUpdated(vec![FakeRunner::installed_row(1)])
        );
    }

    #[tokio::test]
    async fn catalog_refresh_feeds_local_search() {
        let (service, mut rx) = service_with(FakeRunner::new(), FakeRegistry::new());

        assert!(service.search("llama").is_empty());
        service.refresh_catalog();
        let event = next_event(&mut rx).await;
        assert!(matches!(event, AppEvent::CatalogUpdated(ref m) if m.len() == 3));

        let hits = service.search("QWEN");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "qwen2.5-coder");
        assert_eq!(service.search("").len(), 3);
        assert!(service.search("nomatch").is_empty());
    }

    #[tokio::test]
    async fn tags_arrive_tagged_with_their_family() {
        let registry = FakeRegistry::new().with_tags("llama3.2", &["llama3.2:latest"]);
        let (service, mut rx) = service_with(FakeRunner::new(), registry);

        service.fetch_tags("llama3.2");
        let event = next_event(&mut rx).await;
        let AppEvent::TagsFetched { family, tags } = event else {
            panic!("unexpected event: {event:?}");
        };
        assert_eq!(family, "llama3.2");
        assert_eq!(tags[0].tag, "llama3.2:latest");
    }

    #[tokio::test]
    async fn successful_delete_refreshes_installed() {
        let (service, mut rx) = service_with(FakeRunner::new(), FakeRegistry::new());

        service.delete("old-model");
        let mut saw_finished = false;
        let mut saw_refresh = false;
        for _ in 0..2 {
            match next_event(&mut rx).await {
                AppEvent::DeleteFinished { success, .. } => {
                    assert!(success);
                    saw_finished = true;
                }
                AppEvent::InstalledUpdated(_) => saw_refresh = true,
                other => panic!("unexpected event: {other:?}"),
            }
        }
        assert!(saw_finished && saw_refresh);
    }

    #[tokio::test]
    async fn failed_delete_reports_without_refreshing() {
        let runner = FakeRunner {
            delete_ok: false,
            ..FakeRunner::new()
        };
        let (service, mut rx) = service_with(runner, FakeRegistry::new());

        service.delete("missing");
        let event = next_event(&mut rx).await;
        let AppEvent::DeleteFinished {
            success, message, ..
        } = event
        else {
            panic!("unexpected event: {event:?}");
        };
        assert!(!success);
        assert!(message.contains("not found"));
        assert_no_event(&mut rx).await;
    }

    #[tokio::test]
    async fn pull_streams_progress_then_finishes() {
        let runner = FakeRunner {
            pull_script: vec![
                PullEvent::Progress {
                    line: "pulling manifest".to_string(),
                    percent: None,
                },
                PullEvent::Progress {
                    line: "pulling abc... 42%".to_string(),
                    percent: Some(42.0),
                },
                PullEvent::Completed,
            ],
            ..FakeRunner::new()
        };
        let (service, mut rx) = service_with(runner, FakeRegistry::new());

        let tag = service.start_pull("llama3.2:3b").await.unwrap();
        assert_eq!(tag, "llama3.2:3b");

        assert!(matches!(
            next_event(&mut rx).await,
            AppEvent::PullProgress { percent: None, .. }
        ));
        assert!(matches!(
            next_event(&mut rx).await,
            AppEvent::PullProgress {
                percent: Some(p), ..
            } if (p - 42.0).abs() < f32::EPSILON
        ));

        // Terminal outcome plus the follow-up installed refresh.
        let mut saw_finished = false;
        let mut saw_refresh = false;
        for _ in 0..2 {
            match next_event(&mut rx).await {
                AppEvent::PullFinished { tag, outcome } => {
                    assert_eq!(tag, "llama3.2:3b");
                    assert_eq!(outcome, PullOutcome::Completed);
                    saw_finished = true;
                }
                AppEvent::InstalledUpdated(_) => saw_refresh = true,
                other => panic!("unexpected event: {other:?}"),
            }
        }
        assert!(saw_finished && saw_refresh);
        assert_eq!(service.active_pull().await, None);
    }

    #[tokio::test]
    async fn second_pull_is_refused_until_the_first_ends() {
        let runner = FakeRunner {
            hold_pull_open: true,
            ..FakeRunner::new()
        };
        let (service, mut rx) = service_with(runner, FakeRegistry::new());

        service.start_pull("a:1").await.unwrap();
        assert_eq!(service.active_pull().await, Some("a:1".to_string()));

        let refused = service.start_pull("b:2").await;
        assert!(matches!(refused, Err(PullError::AlreadyActive)));

        assert!(service.cancel_pull().await);
        let event = next_event(&mut rx).await;
        assert_eq!(
            event,
            AppEvent::PullFinished {
                tag: "a:1".to_string(),
                outcome: PullOutcome::Cancelled,
            }
        );
        assert_eq!(service.active_pull().await, None);

        // The slot is free again.
        service.start_pull("b:2").await.unwrap();
    }

    #[tokio::test]
    async fn cancel_without_active_pull_is_a_noop() {
        let (service, _rx) = service_with(FakeRunner::new(), FakeRegistry::new());
        assert!(!service.cancel_pull().await);
    }

    #[tokio::test]
    async fn bare_family_resolves_through_the_registry() {
        let registry = FakeRegistry::new().with_tags(
            "llama3.2",
            &["llama3.2:1b", "llama3.2:latest", "llama3.2:3b"],
        );
        let runner = FakeRunner {
            pull_script: vec![PullEvent::Completed],
            ..FakeRunner::new()
        };
        let (service, _rx) = service_with(runner, registry);

        let tag = service.start_pull("llama3.2").await.unwrap();
        assert_eq!(tag, "llama3.2:latest");
    }

    #[tokio::test]
    async fn family_without_tags_cannot_be_pulled() {
        let (service, _rx) = service_with(FakeRunner::new(), FakeRegistry::new());
        let result = service.start_pull("unknown-family").await;
        assert!(matches!(
            result,
            Err(PullError::TagsUnavailable { ref family }) if family == "unknown-family"
        ));
        assert_eq!(service.active_pull().await, None);
    }

    #[tokio::test]
    async fn ps_poller_publishes_running_snapshots() {
        let (mut service, mut rx) = service_with(FakeRunner::new(), FakeRegistry::new());
        service.ps_refresh = Duration::from_millis(10);

        let shutdown = CancellationToken::new();
        service.spawn_ps_poller(shutdown.clone());

        assert!(matches!(
            next_event(&mut rx).await,
            AppEvent::RunningUpdated(_)
        ));
        assert!(matches!(
            next_event(&mut rx).await,
            AppEvent::RunningUpdated(_)
        ));
        shutdown.cancel();
    }

    #[tokio::test]
    async fn show_details_passes_through() {
        let (service, _rx) = service_with(FakeRunner::new(), FakeRegistry::new());
        assert_eq!(service.show_details("phi4").await, "details for phi4");
    }
}
