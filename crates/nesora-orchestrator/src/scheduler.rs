//! Dependency-wave scheduling of intent batches.
//!
//! A batch runs in waves: every pending intent whose dependencies are all
//! done runs concurrently, and the next wave is computed only after the whole
//! wave has settled and written its context entries. "Done" means attempted,
//! successfully or not, so one failure never blocks unrelated intents.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{FuturesUnordered, StreamExt};
use nesora_core::{AggregateReport, ExecutionContext, ExecutionResult, Intent, NesoraError};
use tracing::{error, info, warn};

use crate::config::OrchestratorConfig;
use crate::executor::{Actor, IntentExecutor};
use crate::transport::Transport;

/// Runs intent batches.
pub struct Orchestrator {
    config: OrchestratorConfig,
    executor: IntentExecutor,
}

impl Orchestrator {
    /// Create an orchestrator over any transport.
    pub fn new(config: OrchestratorConfig, transport: Arc<dyn Transport>) -> Self {
        let executor = IntentExecutor::new(&config, transport);
        Self { config, executor }
    }

    /// Get the configuration.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Execute `intents` for `actor_id` on `domain` and aggregate the outcome.
    ///
    /// Duplicate ids and unknown operations are rejected before the first
    /// wave. If the remaining graph cannot make progress (cycle or missing
    /// dependency), every unattempted intent is reported as an error and the
    /// run stops; those intents do not count towards `intents_executed`.
    pub async fn run(&self, intents: &[Intent], actor_id: &str, domain: &str) -> AggregateReport {
        let started = Instant::now();
        let actor = Actor::new(actor_id, domain);

        let mut context = ExecutionContext::new();
        let mut results: Vec<ExecutionResult> = Vec::new();
        let mut done: HashSet<String> = HashSet::new();

        info!(total = intents.len(), "🔄 Starting intent execution");

        let mut pending = self.admit(intents, &mut context, &mut results, &mut done);

        let mut wave = 0usize;
        while !pending.is_empty() {
            let (ready, blocked): (Vec<&Intent>, Vec<&Intent>) = pending
                .into_iter()
                .partition(|intent| intent.is_ready(|dep| done.contains(dep)));

            if ready.is_empty() {
                warn!(
                    remaining = blocked.len(),
                    "⚠️ No ready intents, possible circular or missing dependency"
                );
                for intent in blocked {
                    let waiting_on = intent
                        .depends_on
                        .iter()
                        .filter(|dep| !done.contains(dep.as_str()))
                        .cloned()
                        .collect();
                    let err = NesoraError::UnresolvableDependency {
                        id: intent.id().to_string(),
                        waiting_on,
                    };
                    let result = ExecutionResult::failure(intent.id(), &intent.name, err);
                    context.record(&result);
                    results.push(result);
                }
                break;
            }

            wave += 1;
            info!(
                wave,
                intents = ?ready.iter().map(|i| i.id()).collect::<Vec<_>>(),
                "🔄 Executing wave"
            );

            for result in self.execute_wave(&ready, &context, &actor).await {
                done.insert(result.id.clone());
                context.record(&result);
                results.push(result);
            }

            pending = blocked;
        }

        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let report = AggregateReport::new(done.len(), results, context, duration_ms);

        info!(
            status = ?report.status,
            success = report.success_count(),
            errors = report.error_count(),
            waves = wave,
            duration_ms,
            "✅ Execution complete"
        );

        report
    }

    /// Boundary checks. Returns the intents that go on to the wave loop.
    fn admit<'a>(
        &self,
        intents: &'a [Intent],
        context: &mut ExecutionContext,
        results: &mut Vec<ExecutionResult>,
        done: &mut HashSet<String>,
    ) -> Vec<&'a Intent> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut admitted = Vec::with_capacity(intents.len());

        for intent in intents {
            let id = intent.id();

            if !seen.insert(id) {
                warn!(intent_id = %id, "duplicate intent id in batch");
                let err = NesoraError::DuplicateIntent { id: id.to_string() };
                results.push(ExecutionResult::failure(id, &intent.name, err));
                continue;
            }

            if let Err(err) = self.executor.endpoint_for(intent) {
                error!(intent_id = %id, intent = %intent.name, "❌ Unknown intent");
                let result = ExecutionResult::failure(id, &intent.name, err);
                context.record(&result);
                results.push(result);
                done.insert(id.to_string());
                continue;
            }

            admitted.push(intent);
        }

        admitted
    }

    /// Fan out one wave on the current task; results come back in settle order.
    async fn execute_wave(
        &self,
        ready: &[&Intent],
        context: &ExecutionContext,
        actor: &Actor,
    ) -> Vec<ExecutionResult> {
        let mut in_flight: FuturesUnordered<_> = ready
            .iter()
            .map(|intent| self.executor.execute_one(intent, context, actor))
            .collect();

        let mut settled = Vec::with_capacity(ready.len());
        while let Some(result) = in_flight.next().await {
            settled.push(result);
        }
        settled
    }
}
