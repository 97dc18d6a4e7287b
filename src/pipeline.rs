// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Idempotent, fail-fast provisioning pipeline.
//!
//! Steps run strictly in declaration order. Each step is probed first and its
//! mutating action only runs when the target state is absent, which is what
//! makes re-running a whole pipeline safe.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::{CorralError, Result};

/// What a step's probe found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Target state already exists; apply must be skipped.
    Present,
    /// Target state is missing; apply may run.
    Absent,
}

/// One named, re-runnable provisioning step.
#[async_trait]
pub trait Step: Send + Sync {
    /// Unique name within a pipeline run.
    fn name(&self) -> &str;

    /// Names of predecessor steps. Execution order is the declaration order;
    /// this list is validated against it, not scheduled from.
    fn depends_on(&self) -> &[&'static str] {
        &[]
    }

    /// Report whether the target state already exists.
    async fn probe(&self) -> Result<Presence>;

    /// Perform the mutating action. Only called when [`Step::probe`]
    /// reported [`Presence::Absent`].
    async fn apply(&self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Applied,
    Skipped,
}

#[derive(Debug)]
pub struct StepRecord {
    pub name: String,
    pub outcome: StepOutcome,
}

#[derive(Debug)]
pub struct StepFailure {
    pub step: String,
    pub error: CorralError,
}

/// Result of a pipeline run, partial when a step failed.
#[derive(Debug, Default)]
pub struct PipelineReport {
    pub records: Vec<StepRecord>,
    pub failure: Option<StepFailure>,
}

impl PipelineReport {
    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }

    pub fn applied(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.outcome == StepOutcome::Applied)
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.outcome == StepOutcome::Skipped)
            .count()
    }
}

/// Check step names are unique and dependencies refer to earlier steps.
fn validate(steps: &[Box<dyn Step>]) -> Result<()> {
    let mut seen: Vec<&str> = Vec::with_capacity(steps.len());
    for step in steps {
        if seen.contains(&step.name()) {
            return Err(CorralError::PreconditionFailed(format!(
                "duplicate step name '{}'",
                step.name()
            )));
        }
        for dep in step.depends_on() {
            if !seen.contains(dep) {
                return Err(CorralError::PreconditionFailed(format!(
                    "step '{}' depends on '{}', which does not run before it",
                    step.name(),
                    dep
                )));
            }
        }
        seen.push(step.name());
    }
    Ok(())
}

/// Run the pipeline, aborting on the first failed apply.
pub async fn run(steps: &[Box<dyn Step>], cancel: &CancellationToken) -> PipelineReport {
    let mut report = PipelineReport::default();

    if let Err(error) = validate(steps) {
        report.failure = Some(StepFailure {
            step: "(validation)".to_string(),
            error,
        });
        return report;
    }

    for step in steps {
        let name = step.name().to_string();

        if cancel.is_cancelled() {
            report.failure = Some(StepFailure {
                step: name,
                error: CorralError::PreconditionFailed("run cancelled".to_string()),
            });
            return report;
        }

        match step.probe().await {
            Ok(Presence::Present) => {
                info!("step '{}': already satisfied, skipping", name);
                report.records.push(StepRecord {
                    name,
                    outcome: StepOutcome::Skipped,
                });
            }
            Ok(Presence::Absent) => {
                info!("step '{}': applying", name);
                if let Err(e) = step.apply().await {
                    let error = contextualize_apply_error(&name, e);
                    error!("step '{}' failed: {}", name, error);
                    report.failure = Some(StepFailure { step: name, error });
                    return report;
                }
                report.records.push(StepRecord {
                    name,
                    outcome: StepOutcome::Applied,
                });
            }
            Err(e) => {
                error!("step '{}' probe failed: {}", name, e);
                report.failure = Some(StepFailure { step: name, error: e });
                return report;
            }
        }
    }

    report
}

/// Keep launch/timeout errors as they are; fold everything else into
/// `ApplyFailed` so the operator sees the failing step.
fn contextualize_apply_error(step: &str, error: CorralError) -> CorralError {
    match error {
        e @ (CorralError::Timeout(_)
        | CorralError::LaunchFailed { .. }
        | CorralError::NoPortAvailable
        | CorralError::ApplyFailed { .. }) => e,
        other => CorralError::ApplyFailed {
            step: step.to_string(),
            reason: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Arc;

    /// Step whose target state is the `created` flag.
    struct FlagStep {
        name: &'static str,
        deps: Vec<&'static str>,
        created: Arc<AtomicBool>,
        fail_apply: bool,
        probes: Arc<AtomicU32>,
    }

    impl FlagStep {
        fn boxed(name: &'static str, created: Arc<AtomicBool>) -> Box<dyn Step> {
            Box::new(Self {
                name,
                deps: vec![],
                created,
                fail_apply: false,
                probes: Arc::new(AtomicU32::new(0)),
            })
        }

        fn failing(name: &'static str) -> Box<dyn Step> {
            Box::new(Self {
                name,
                deps: vec![],
                created: Arc::new(AtomicBool::new(false)),
                fail_apply: true,
                probes: Arc::new(AtomicU32::new(0)),
            })
        }
    }

    #[async_trait]
    impl Step for FlagStep {
        fn name(&self) -> &str {
            self.name
        }

        fn depends_on(&self) -> &[&'static str] {
            &self.deps
        }

        async fn probe(&self) -> Result<Presence> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            if self.created.load(Ordering::SeqCst) {
                Ok(Presence::Present)
            } else {
                Ok(Presence::Absent)
            }
        }

        async fn apply(&self) -> Result<()> {
            if self.fail_apply {
                return Err(CorralError::ToolFailed {
                    command: "helm upgrade".to_string(),
                    detail: "boom".to_string(),
                });
            }
            self.created.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn make_flags(n: usize) -> Vec<Arc<AtomicBool>> {
        (0..n).map(|_| Arc::new(AtomicBool::new(false))).collect()
    }

    #[tokio::test]
    async fn test_fresh_run_applies_every_step() {
        let flags = make_flags(3);
        let steps: Vec<Box<dyn Step>> = vec![
            FlagStep::boxed("cluster", flags[0].clone()),
            FlagStep::boxed("namespaces", flags[1].clone()),
            FlagStep::boxed("workload", flags[2].clone()),
        ];

        let report = run(&steps, &CancellationToken::new()).await;
        assert!(report.succeeded());
        assert_eq!(report.applied(), 3);
        assert!(flags.iter().all(|f| f.load(Ordering::SeqCst)));
    }

    #[tokio::test]
    async fn test_second_run_is_all_skipped() {
        let flags = make_flags(2);
        let steps: Vec<Box<dyn Step>> = vec![
            FlagStep::boxed("cluster", flags[0].clone()),
            FlagStep::boxed("workload", flags[1].clone()),
        ];
        let cancel = CancellationToken::new();

        let first = run(&steps, &cancel).await;
        assert_eq!(first.applied(), 2);

        let second = run(&steps, &cancel).await;
        assert!(second.succeeded());
        assert_eq!(second.applied(), 0);
        assert_eq!(second.skipped(), 2);
    }

    #[tokio::test]
    async fn test_failing_apply_aborts_remaining_steps() {
        let flags = make_flags(2);
        let tail_probe_count = Arc::new(AtomicU32::new(0));
        let steps: Vec<Box<dyn Step>> = vec![
            FlagStep::boxed("cluster", flags[0].clone()),
            FlagStep::failing("gitops"),
            Box::new(FlagStep {
                name: "workload",
                deps: vec![],
                created: flags[1].clone(),
                fail_apply: false,
                probes: tail_probe_count.clone(),
            }),
        ];

        let report = run(&steps, &CancellationToken::new()).await;

        assert!(!report.succeeded());
        let failure = report.failure.as_ref().unwrap();
        assert_eq!(failure.step, "gitops");
        assert!(matches!(failure.error, CorralError::ApplyFailed { .. }));
        // The step after the failure must never have been touched.
        assert_eq!(tail_probe_count.load(Ordering::SeqCst), 0);
        assert!(!flags[1].load(Ordering::SeqCst));
        assert_eq!(report.records.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_step_names_rejected() {
        let flags = make_flags(2);
        let steps: Vec<Box<dyn Step>> = vec![
            FlagStep::boxed("cluster", flags[0].clone()),
            FlagStep::boxed("cluster", flags[1].clone()),
        ];

        let report = run(&steps, &CancellationToken::new()).await;
        assert!(!report.succeeded());
        assert!(report.records.is_empty());
    }

    #[tokio::test]
    async fn test_dependency_must_precede_dependent() {
        let flags = make_flags(2);
        let steps: Vec<Box<dyn Step>> = vec![
            Box::new(FlagStep {
                name: "workload",
                deps: vec!["cluster"],
                created: flags[0].clone(),
                fail_apply: false,
                probes: Arc::new(AtomicU32::new(0)),
            }),
            FlagStep::boxed("cluster", flags[1].clone()),
        ];

        let report = run(&steps, &CancellationToken::new()).await;
        assert!(!report.succeeded());
        assert!(matches!(
            report.failure.unwrap().error,
            CorralError::PreconditionFailed(_)
        ));
    }

    #[tokio::test]
    async fn test_satisfied_dependency_order_passes() {
        let flags = make_flags(2);
        let steps: Vec<Box<dyn Step>> = vec![
            FlagStep::boxed("cluster", flags[0].clone()),
            Box::new(FlagStep {
                name: "workload",
                deps: vec!["cluster"],
                created: flags[1].clone(),
                fail_apply: false,
                probes: Arc::new(AtomicU32::new(0)),
            }),
        ];

        let report = run(&steps, &CancellationToken::new()).await;
        assert!(report.succeeded());
    }

    #[tokio::test]
    async fn test_cancelled_run_stops_before_next_step() {
        let flags = make_flags(1);
        let steps: Vec<Box<dyn Step>> = vec![FlagStep::boxed("cluster", flags[0].clone())];

        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = run(&steps, &cancel).await;
        assert!(!report.succeeded());
        assert!(!flags[0].load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_timeout_error_keeps_its_type() {
        struct TimeoutStep;

        #[async_trait]
        impl Step for TimeoutStep {
            fn name(&self) -> &str {
                "gitops"
            }
            async fn probe(&self) -> Result<Presence> {
                Ok(Presence::Absent)
            }
            async fn apply(&self) -> Result<()> {
                Err(CorralError::Timeout("gitops rollout".to_string()))
            }
        }

        let steps: Vec<Box<dyn Step>> = vec![Box::new(TimeoutStep)];
        let report = run(&steps, &CancellationToken::new()).await;
        assert!(matches!(
            report.failure.unwrap().error,
            CorralError::Timeout(_)
        ));
    }
}
