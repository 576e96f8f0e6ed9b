//! The Audit Coordinator (spec §4.7): owns the audit lifecycle state
//! machine, resolves profiles into plans, drives the scheduler, runs
//! correlation, joins compliance controls, and serves `get_status`/
//! `get_report`/`cancel`. Grounded in the agency's `WorkerPoolManager`
//! orchestration style (`workers/src/manager.rs`: one owning actor per
//! unit of work, background task drives it to completion, observers read
//! state through accessor methods rather than mutating it directly).

pub mod progress;
pub mod report;

use aoc_core::{
    normalize, profile_defaults, validate_custom, AocConfig, AocError, AocResult, AuditPlan,
    AuditState, BusPayload, CancelSignal, ContractRef, CorrelatedFinding, CorrelationConfig,
    CrossLayerMode, Finding, Profile, RawFinding, ReportStatus, Taxonomy,
};
use aoc_bus::ContextBus;
use aoc_correlation::correlate;
use aoc_observability::MetricsCollector;
use aoc_registry::ToolRegistry;
use aoc_scheduler::LayeredScheduler;
use dashmap::DashMap;
use progress::{spawn_tracker, ProgressCounters};
use report::{build_report, AuditReport};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, RwLock};
use tracing::{info, warn};

/// The static lookup tables a coordinator needs, loaded once at process
/// startup by the caller (spec §6.7) and shared across every audit.
#[derive(Debug, Default)]
pub struct StaticTables {
    pub taxonomy_map: HashMap<String, Taxonomy>,
    pub severity_map: HashMap<String, HashMap<String, String>>,
    pub fp_priors: HashMap<String, f64>,
    pub compliance_map: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct StartAuditRequest {
    pub target: ContractRef,
    pub profile: Profile,
    pub layers: Option<Vec<u8>>,
    pub tools: Option<Vec<String>>,
    pub cross_layer_mode: Option<CrossLayerMode>,
    pub global_deadline: Option<Duration>,
    pub workspace_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct AuditStatusView {
    pub audit_id: String,
    pub state: AuditState,
    pub tools_pending: u32,
    pub tools_running: u32,
    pub tools_finished: u32,
    pub raw_finding_count: u32,
    pub correlated_finding_count: u32,
}

struct AuditRecord {
    plan: AuditPlan,
    state: RwLock<AuditState>,
    cancel: CancelSignal,
    progress: Arc<ProgressCounters>,
    report: RwLock<Option<AuditReport>>,
    report_ready: Notify,
    started_at: tokio::time::Instant,
}

pub struct AuditCoordinator {
    registry: Arc<ToolRegistry>,
    bus: Arc<ContextBus>,
    metrics: Arc<MetricsCollector>,
    scheduler: Arc<LayeredScheduler>,
    config: AocConfig,
    tables: Arc<StaticTables>,
    audits: DashMap<String, Arc<AuditRecord>>,
}

fn cross_layer_mode_from_config(config: &aoc_core::config::CrossLayerModeConfig) -> CrossLayerMode {
    match config {
        aoc_core::config::CrossLayerModeConfig::Sequential => CrossLayerMode::Sequential,
        aoc_core::config::CrossLayerModeConfig::Pipelined => CrossLayerMode::Pipelined,
    }
}

impl AuditCoordinator {
    pub fn new(
        registry: Arc<ToolRegistry>,
        bus: Arc<ContextBus>,
        metrics: Arc<MetricsCollector>,
        config: AocConfig,
        tables: StaticTables,
    ) -> Self {
        Self {
            scheduler: Arc::new(LayeredScheduler::new(registry.clone(), bus.clone(), metrics.clone())),
            registry,
            bus,
            metrics,
            config,
            tables: Arc::new(tables),
            audits: DashMap::new(),
        }
    }

    pub fn registry(&self) -> Arc<ToolRegistry> {
        self.registry.clone()
    }

    pub fn bus(&self) -> Arc<ContextBus> {
        self.bus.clone()
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    fn record(&self, audit_id: &str) -> AocResult<Arc<AuditRecord>> {
        self.audits
            .get(audit_id)
            .map(|r| r.clone())
            .ok_or_else(|| AocError::InputInvalid(format!("unknown audit_id '{audit_id}'")))
    }

    /// Resolves `request.profile` into layers + tools_by_layer + deadlines,
    /// allocates an audit id, transitions CREATED -> PLANNED, publishes
    /// `plan.created`, and spawns the background task that drives the
    /// audit through RUNNING -> CORRELATING -> a terminal state.
    pub async fn start_audit(&self, request: StartAuditRequest) -> AocResult<String> {
        let (layers, per_tool_deadline_default, global_deadline) = match request.profile {
            Profile::Custom => {
                let layers = request.layers.clone().ok_or_else(|| {
                    AocError::InputInvalid("custom profile requires explicit layers".to_string())
                })?;
                let global_deadline = request
                    .global_deadline
                    .unwrap_or_else(|| Duration::from_secs(self.config.timeouts.global_s));
                validate_custom(&layers, global_deadline)?;
                (
                    layers,
                    Duration::from_secs(self.config.timeouts.per_tool_s),
                    global_deadline,
                )
            }
            profile => {
                let defaults = profile_defaults(profile)?;
                (
                    defaults.layers,
                    defaults.per_tool_deadline,
                    request.global_deadline.unwrap_or(defaults.global_deadline),
                )
            }
        };

        let available = self.registry.available_only(Duration::from_secs(5)).await;
        let available_ids: HashSet<String> = available.iter().map(|t| t.id.clone()).collect();

        let mut tools_by_layer: HashMap<u8, Vec<String>> = HashMap::new();
        let mut per_tool_deadlines: HashMap<String, Duration> = HashMap::new();
        let mut tools_used = Vec::new();

        for layer in &layers {
            let mut ids: Vec<String> = self
                .registry
                .by_layer(*layer)
                .into_iter()
                .map(|t| t.id)
                .filter(|id| available_ids.contains(id))
                .filter(|id| request.tools.as_ref().map_or(true, |allow| allow.contains(id)))
                .filter(|id| {
                    self.config.tools.enable.is_empty() || self.config.tools.enable.contains(id)
                })
                .filter(|id| !self.config.tools.disable.contains(id))
                .collect();
            ids.sort();
            for id in &ids {
                per_tool_deadlines.insert(id.clone(), per_tool_deadline_default);
            }
            tools_used.extend(ids.iter().cloned());
            tools_by_layer.insert(*layer, ids);
        }

        let audit_id = ulid::Ulid::new().to_string();
        let cross_layer_mode = request
            .cross_layer_mode
            .unwrap_or_else(|| cross_layer_mode_from_config(&self.config.scheduler.cross_layer_mode));

        let plan = AuditPlan {
            audit_id: audit_id.clone(),
            target: request.target,
            profile: request.profile,
            layers,
            tools_by_layer,
            global_deadline,
            per_tool_deadlines,
            max_parallel_per_layer: self.config.scheduler.max_parallel_per_layer,
            cross_layer_mode,
        };

        let record = Arc::new(AuditRecord {
            plan: plan.clone(),
            state: RwLock::new(AuditState::Created),
            cancel: CancelSignal::new(),
            progress: Arc::new(ProgressCounters::default()),
            report: RwLock::new(None),
            report_ready: Notify::new(),
            started_at: tokio::time::Instant::now(),
        });
        record.progress.set_pending(tools_used.len() as u32);
        self.audits.insert(audit_id.clone(), record.clone());

        self.transition(&record, AuditState::Planned).await;
        self.bus
            .publish(&audit_id, BusPayload::PlanCreated { plan: plan.clone() });

        info!(audit_id = %audit_id, tools = tools_used.len(), "audit plan created");

        let coordinator = self.clone_handles();
        let workspace_dir = request.workspace_dir;
        tokio::spawn(async move {
            coordinator.drive(record, workspace_dir).await;
        });

        Ok(audit_id)
    }

    /// A cheap `Arc`-clone bundle so the background task can keep driving an
    /// audit without borrowing `&self` across an `.await` that outlives the
    /// call to `start_audit`.
    fn clone_handles(&self) -> CoordinatorHandles {
        CoordinatorHandles {
            registry: self.registry.clone(),
            bus: self.bus.clone(),
            scheduler: self.scheduler.clone(),
            tables: self.tables.clone(),
            correlation: self.config.correlation.clone(),
        }
    }

    async fn transition(&self, record: &Arc<AuditRecord>, next: AuditState) {
        let mut state = record.state.write().await;
        if !state.can_transition_to(next) {
            warn!(from = ?*state, to = ?next, "coordinator attempted illegal state transition");
        }
        *state = next;
    }

    pub async fn get_status(&self, audit_id: &str) -> AocResult<AuditStatusView> {
        let record = self.record(audit_id)?;
        let (pending, running, finished, raw_findings) = record.progress.snapshot();
        let correlated_finding_count = record
            .report
            .read()
            .await
            .as_ref()
            .map(|r| r.findings.len() as u32)
            .unwrap_or(0);
        Ok(AuditStatusView {
            audit_id: audit_id.to_string(),
            state: *record.state.read().await,
            tools_pending: pending,
            tools_running: running,
            tools_finished: finished,
            raw_finding_count: raw_findings,
            correlated_finding_count,
        })
    }

    /// `(audits_active, audits_completed)` across every audit this
    /// coordinator has ever started, for `status` (spec §6.1) and the
    /// RPC/REST boundary's `max_concurrent_audits` cap (spec §4.8).
    pub async fn lifecycle_counts(&self) -> (usize, usize) {
        let mut active = 0;
        let mut completed = 0;
        for entry in self.audits.iter() {
            if entry.value().state.read().await.is_terminal() {
                completed += 1;
            } else {
                active += 1;
            }
        }
        (active, completed)
    }

    pub async fn cancel(&self, audit_id: &str) -> AocResult<()> {
        let record = self.record(audit_id)?;
        record.cancel.cancel();
        info!(audit_id, "cancellation requested");
        Ok(())
    }

    /// Returns the finalized report once the audit reaches a terminal
    /// state. `partial` is accepted for API compatibility with spec §4.7
    /// but this implementation always waits for finalization: a true
    /// in-flight snapshot (findings correlated so far, before the audit
    /// ends) is not modeled, since partial results are only meaningful once
    /// the scheduler itself has produced a partial-timeout outcome, which
    /// the finalized report already reflects via `partial_timeout`.
    pub async fn get_report(&self, audit_id: &str, _partial: bool) -> AocResult<AuditReport> {
        let record = self.record(audit_id)?;
        loop {
            if let Some(report) = record.report.read().await.clone() {
                return Ok(report);
            }
            record.report_ready.notified().await;
        }
    }

}

/// The subset of `AuditCoordinator`'s state the background driver task
/// needs; split out so `start_audit` doesn't have to keep `&self` borrowed
/// across the audit's full lifetime.
struct CoordinatorHandles {
    registry: Arc<ToolRegistry>,
    bus: Arc<ContextBus>,
    scheduler: Arc<LayeredScheduler>,
    tables: Arc<StaticTables>,
    correlation: aoc_core::CorrelationConfig,
}

impl CoordinatorHandles {
    async fn drive(&self, record: Arc<AuditRecord>, workspace_dir: PathBuf) {
        let audit_id = record.plan.audit_id.clone();
        *record.state.write().await = AuditState::Running;

        let tracker = spawn_tracker(self.bus.clone(), audit_id.clone(), record.progress.clone());

        let (layer_tx, layer_rx) = tokio::sync::mpsc::unbounded_channel::<Vec<RawFinding>>();
        let incremental = tokio::spawn(Self::correlate_incrementally(
            self.bus.clone(),
            self.registry.clone(),
            self.tables.clone(),
            self.correlation.clone(),
            audit_id.clone(),
            layer_rx,
        ));

        let outcome = self
            .scheduler
            .run(
                &record.plan,
                &record.plan.target.clone(),
                workspace_dir,
                &record.cancel,
                &layer_tx,
            )
            .await;
        drop(layer_tx);

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(audit_id = %audit_id, error = %err, "scheduler returned an error");
                *record.state.write().await = AuditState::Failed;
                self.bus.publish(
                    &audit_id,
                    BusPayload::AuditFailed {
                        error: err.to_string(),
                    },
                );
                record.report_ready.notify_waiters();
                let _ = incremental.await;
                return;
            }
        };

        *record.state.write().await = AuditState::Correlating;

        // The incremental task has already normalized and correlated every
        // finding as its layer arrived (publishing `finding.normalized` and
        // `finding.correlated` along the way); its final tally is also the
        // authoritative input to the report below, so there is no separate
        // end-of-run normalize/correlate pass to duplicate it.
        let (_findings, correlated) = incremental.await.unwrap_or_default();

        let status = if outcome.cancelled {
            ReportStatus::Cancelled
        } else if outcome.partial_timeout {
            ReportStatus::PartialTimeout
        } else {
            ReportStatus::Ok
        };

        let tools_used: Vec<String> = record
            .plan
            .tools_by_layer
            .values()
            .flat_map(|ids| ids.iter().cloned())
            .collect();

        let report = build_report(
            audit_id.clone(),
            status,
            outcome.partial_timeout,
            record.started_at.elapsed().as_secs_f64(),
            tools_used,
            correlated,
            &self.tables.compliance_map,
        );

        *record.report.write().await = Some(report);
        record.report_ready.notify_waiters();

        let final_state = if outcome.cancelled {
            AuditState::Cancelled
        } else {
            AuditState::Completed
        };
        *record.state.write().await = final_state;

        if outcome.cancelled {
            self.bus.publish(&audit_id, BusPayload::AuditCancelled);
        } else {
            self.bus.publish(
                &audit_id,
                BusPayload::AuditCompleted {
                    partial_timeout: outcome.partial_timeout,
                },
            );
        }

        tracker.abort();
        info!(audit_id = %audit_id, "audit finished");
    }

    /// Normalizes and re-correlates as each layer's raw findings arrive over
    /// `layer_rx`, publishing `finding.raw`/`finding.normalized` per finding
    /// and a fresh `finding.correlated` per fingerprint group after every
    /// batch, so a bus subscriber sees findings as the audit progresses
    /// rather than only once at the end (spec §4.5/§4.6). Returns the final
    /// normalized + correlated sets once `layer_rx` closes, which `drive`
    /// reuses as the report's authoritative input.
    async fn correlate_incrementally(
        bus: Arc<ContextBus>,
        registry: Arc<ToolRegistry>,
        tables: Arc<StaticTables>,
        correlation: CorrelationConfig,
        audit_id: String,
        mut layer_rx: tokio::sync::mpsc::UnboundedReceiver<Vec<RawFinding>>,
    ) -> (Vec<Finding>, Vec<CorrelatedFinding>) {
        let mut findings: Vec<Finding> = Vec::new();
        let mut correlated: Vec<CorrelatedFinding> = Vec::new();
        let mut next_id = 0usize;

        while let Some(batch) = layer_rx.recv().await {
            if batch.is_empty() {
                continue;
            }
            for raw in batch {
                let layer = registry.metadata(&raw.source_tool).map(|t| t.layer).unwrap_or(0);
                match normalize(
                    raw,
                    layer,
                    &tables.taxonomy_map,
                    Some(&tables.severity_map),
                    format!("{audit_id}-{next_id}"),
                ) {
                    Ok(finding) => {
                        bus.publish(
                            &audit_id,
                            BusPayload::FindingNormalized {
                                finding: finding.clone(),
                            },
                        );
                        findings.push(finding);
                    }
                    Err(err) => warn!(audit_id = %audit_id, error = %err, "dropping malformed finding"),
                }
                next_id += 1;
            }

            correlated = correlate(&findings, &tables.fp_priors, &correlation);
            for finding in &correlated {
                bus.publish(
                    &audit_id,
                    BusPayload::FindingCorrelated {
                        finding: finding.clone(),
                    },
                );
            }
        }

        (findings, correlated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aoc_adapters::SlitherEqAdapter;
    use aoc_core::AuditState;
    use tokio::time::{timeout, Duration as StdDuration};

    fn vulnerable_target() -> ContractRef {
        ContractRef::Inline {
            logical_id: "Vault".to_string(),
            source: "contract Vault { function withdraw() external { msg.sender.call{value: 1}(\"\"); } }"
                .to_string(),
        }
    }

    async fn coordinator_with_slither() -> AuditCoordinator {
        let registry = Arc::new(ToolRegistry::new());
        registry.register(Arc::new(SlitherEqAdapter), false).unwrap();
        let bus = Arc::new(ContextBus::new(64, 256));
        let metrics = Arc::new(MetricsCollector::new());
        let mut tables = StaticTables::default();
        tables
            .taxonomy_map
            .insert("reentrancy-eth".to_string(), Taxonomy {
                swc: Some("SWC-107".to_string()),
                cwe: None,
                owasp_sc: None,
            });
        tables.compliance_map.insert(
            "SWC-107".to_string(),
            vec!["ISO27001-A.14.2.5".to_string()],
        );
        AuditCoordinator::new(registry, bus, metrics, AocConfig::default(), tables)
    }

    #[tokio::test]
    async fn start_audit_runs_to_completion_and_produces_a_report() {
        let coordinator = coordinator_with_slither().await;
        let audit_id = coordinator
            .start_audit(StartAuditRequest {
                target: vulnerable_target(),
                profile: Profile::Quick,
                layers: None,
                tools: None,
                cross_layer_mode: None,
                global_deadline: None,
                workspace_dir: std::env::temp_dir(),
            })
            .await
            .unwrap();

        let report = timeout(StdDuration::from_secs(5), coordinator.get_report(&audit_id, false))
            .await
            .expect("audit should finish within the test timeout")
            .unwrap();

        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].compliance_hits, vec!["ISO27001-A.14.2.5".to_string()]);

        let status = coordinator.get_status(&audit_id).await.unwrap();
        assert_eq!(status.state, AuditState::Completed);
        assert_eq!(status.correlated_finding_count, 1);
    }

    #[tokio::test]
    async fn finding_events_are_published_incrementally_during_the_audit() {
        let coordinator = coordinator_with_slither().await;
        let mut sub = coordinator.bus().subscribe(None, None);

        let audit_id = coordinator
            .start_audit(StartAuditRequest {
                target: vulnerable_target(),
                profile: Profile::Quick,
                layers: None,
                tools: None,
                cross_layer_mode: None,
                global_deadline: None,
                workspace_dir: std::env::temp_dir(),
            })
            .await
            .unwrap();

        timeout(StdDuration::from_secs(5), coordinator.get_report(&audit_id, false))
            .await
            .expect("audit should finish within the test timeout")
            .unwrap();

        let mut saw_raw = false;
        let mut saw_normalized = false;
        let mut saw_correlated = false;
        while let Ok(Some(event)) = timeout(StdDuration::from_millis(200), sub.receiver.recv()).await {
            match event.payload {
                aoc_core::BusPayload::FindingRaw { .. } => saw_raw = true,
                aoc_core::BusPayload::FindingNormalized { .. } => saw_normalized = true,
                aoc_core::BusPayload::FindingCorrelated { finding } => {
                    saw_correlated = true;
                    assert_eq!(finding.revision, 1);
                }
                _ => {}
            }
        }

        assert!(saw_raw, "expected at least one finding.raw event");
        assert!(saw_normalized, "expected at least one finding.normalized event");
        assert!(saw_correlated, "expected at least one finding.correlated event");
    }

    #[tokio::test]
    async fn unknown_audit_id_is_reported_as_input_invalid() {
        let coordinator = coordinator_with_slither().await;
        let err = coordinator.get_status("does-not-exist").await.unwrap_err();
        assert!(matches!(err, AocError::InputInvalid(_)));
    }

    #[tokio::test]
    async fn custom_profile_without_layers_is_rejected() {
        let coordinator = coordinator_with_slither().await;
        let err = coordinator
            .start_audit(StartAuditRequest {
                target: vulnerable_target(),
                profile: Profile::Custom,
                layers: None,
                tools: None,
                cross_layer_mode: None,
                global_deadline: None,
                workspace_dir: std::env::temp_dir(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AocError::InputInvalid(_)));
    }
}
