//! Batch orchestration: replay payloads per entity, persist state, emit events
//!
//! One processing pass groups a time-ordered payload batch by entity, loads
//! each entity's prior state from the store, replays the entity's payloads
//! through a detector, writes the updated state back in a single logical
//! write per entity, and collects every regressed/improved classification
//! as a trend event.
//!
//! Entities share no mutable state, so the compute stage can fan out across
//! scoped worker threads; loads and write-backs stay sequential so the
//! store only ever sees single-threaded access.

use std::collections::BTreeMap;
use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::detector::{
    DetectorConfig, DetectorState, MovingAverageRelativeChangeDetector, TrendType,
};
use crate::payload::{DetectorPayload, EntityKey};
use crate::store::StateStore;

/// Classified trend change for one entity, ready for downstream consumers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendEvent {
    pub project_id: u64,
    pub group: String,
    pub fingerprint: u64,
    pub trend_type: TrendType,
    pub score: f64,
    /// Timestamp of the payload that triggered the classification
    pub timestamp: DateTime<Utc>,
    /// Value of the triggering payload
    pub value: f64,
    /// Raw-sample count of the triggering payload
    pub count: u64,
}

impl TrendEvent {
    fn new(payload: &DetectorPayload, trend_type: TrendType, score: f64) -> Self {
        Self {
            project_id: payload.project_id,
            group: payload.group.clone(),
            fingerprint: payload.fingerprint,
            trend_type,
            score,
            timestamp: payload.timestamp,
            value: payload.value,
            count: payload.count,
        }
    }
}

/// What to do with an entity whose persisted state fails to decode
///
/// The codec surfaces the error; the runner applies the policy. Silent
/// substitution inside the codec would hide data corruption from callers
/// that want to abort instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodePolicy {
    /// Log a warning and treat the entity as never seen
    ResetToEmpty,
    /// Log a warning and leave the entity untouched for this batch
    SkipEntity,
}

/// Summary of one processing pass
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    /// Every regressed/improved classification observed in the batch
    pub events: Vec<TrendEvent>,
    pub entities_processed: usize,
    /// Entities skipped under [`DecodePolicy::SkipEntity`]
    pub entities_skipped: usize,
    pub payloads_processed: usize,
}

struct EntityTask {
    key: EntityKey,
    state: DetectorState,
    payloads: Vec<DetectorPayload>,
}

struct EntityResult {
    key: EntityKey,
    fields: HashMap<String, String>,
    events: Vec<TrendEvent>,
}

/// Drives detectors over payload batches against a state store
pub struct BatchRunner<S: StateStore> {
    store: S,
    config: DetectorConfig,
    decode_policy: DecodePolicy,
    workers: usize,
}

impl<S: StateStore> BatchRunner<S> {
    pub fn new(store: S, config: DetectorConfig) -> Self {
        Self {
            store,
            config,
            decode_policy: DecodePolicy::ResetToEmpty,
            workers: 1,
        }
    }

    /// Fallback applied when persisted state fails to decode
    pub fn with_decode_policy(mut self, policy: DecodePolicy) -> Self {
        self.decode_policy = policy;
        self
    }

    /// Worker threads for the compute stage; 1 disables fan-out
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Hand the store back, e.g. to flush a file-backed one
    pub fn into_store(self) -> S {
        self.store
    }

    /// Run one processing pass over a batch of payloads
    ///
    /// Payloads must be in non-decreasing timestamp order within each
    /// entity; entities themselves carry no ordering requirement.
    ///
    /// # Errors
    /// Store read/write failures abort the pass. Decode failures are
    /// handled per the configured [`DecodePolicy`] instead.
    pub fn process(&mut self, payloads: Vec<DetectorPayload>) -> Result<BatchOutcome> {
        let payloads_processed = payloads.len();
        let by_entity = group_by_entity(payloads);
        tracing::debug!(
            entities = by_entity.len(),
            payloads = payloads_processed,
            "starting batch pass"
        );

        let mut tasks = Vec::with_capacity(by_entity.len());
        let mut entities_skipped = 0;
        for (key, entity_payloads) in by_entity {
            let storage_key = key.storage_key();
            let state = match self
                .store
                .get(&storage_key)
                .with_context(|| format!("Failed to load state for entity {key}"))?
            {
                None => DetectorState::empty(),
                Some(fields) => match DetectorState::from_field_map(&fields) {
                    Ok(state) => state,
                    Err(e) => match self.decode_policy {
                        DecodePolicy::ResetToEmpty => {
                            tracing::warn!(entity = %key, error = %e, "resetting undecodable state");
                            DetectorState::empty()
                        }
                        DecodePolicy::SkipEntity => {
                            tracing::warn!(entity = %key, error = %e, "skipping entity");
                            entities_skipped += 1;
                            continue;
                        }
                    },
                },
            };
            tasks.push(EntityTask {
                key,
                state,
                payloads: entity_payloads,
            });
        }

        let results = if self.workers > 1 && tasks.len() > 1 {
            run_entities_parallel(&self.config, tasks, self.workers)
        } else {
            let config = &self.config;
            tasks.into_iter().map(|t| run_entity(config, t)).collect()
        };

        let mut events = Vec::new();
        let mut entities_processed = 0;
        for result in results {
            self.store
                .set(&result.key.storage_key(), result.fields)
                .with_context(|| format!("Failed to persist state for entity {}", result.key))?;
            entities_processed += 1;
            events.extend(result.events);
        }

        tracing::info!(
            entities = entities_processed,
            skipped = entities_skipped,
            events = events.len(),
            "batch pass complete"
        );
        Ok(BatchOutcome {
            events,
            entities_processed,
            entities_skipped,
            payloads_processed,
        })
    }
}

/// Group a batch by entity, preserving per-entity input order
///
/// The BTreeMap keeps entity iteration deterministic across runs.
fn group_by_entity(payloads: Vec<DetectorPayload>) -> BTreeMap<EntityKey, Vec<DetectorPayload>> {
    let mut by_entity: BTreeMap<EntityKey, Vec<DetectorPayload>> = BTreeMap::new();
    for payload in payloads {
        by_entity.entry(payload.entity_key()).or_default().push(payload);
    }
    by_entity
}

fn run_entity(config: &DetectorConfig, task: EntityTask) -> EntityResult {
    let mut detector = MovingAverageRelativeChangeDetector::from_state(
        task.key.group.clone(),
        task.key.fingerprint.to_string(),
        config.clone(),
        task.state,
    );
    let mut events = Vec::new();
    for payload in &task.payloads {
        let (trend, score) = detector.update(payload);
        if trend != TrendType::Unchanged {
            tracing::debug!(entity = %task.key, trend = %trend, score, "trend change");
            events.push(TrendEvent::new(payload, trend, score));
        }
    }
    EntityResult {
        key: task.key,
        fields: detector.state().to_field_map(),
        events,
    }
}

/// Fan the pure compute stage out across scoped worker threads
///
/// Chunk order is preserved so results stay deterministic. A panic in a
/// worker (e.g. the out-of-order assertion) is propagated to the caller.
fn run_entities_parallel(
    config: &DetectorConfig,
    tasks: Vec<EntityTask>,
    workers: usize,
) -> Vec<EntityResult> {
    let chunk_size = (tasks.len() + workers - 1) / workers;
    let mut chunks: Vec<Vec<EntityTask>> = Vec::with_capacity(workers);
    let mut tasks = tasks.into_iter().peekable();
    while tasks.peek().is_some() {
        chunks.push(tasks.by_ref().take(chunk_size).collect());
    }

    crossbeam::thread::scope(|s| {
        let handles: Vec<_> = chunks
            .into_iter()
            .map(|chunk| {
                s.spawn(move |_| {
                    chunk
                        .into_iter()
                        .map(|t| run_entity(config, t))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
            .collect()
    })
    .unwrap_or_else(|e| std::panic::resume_unwind(e))
}
