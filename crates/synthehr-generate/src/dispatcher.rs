use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde_json::Value;
use thiserror::Error;
use tokio::task::{self, JoinSet};
use tracing::{info, warn};

use synthehr_core::Template;

use crate::errors::DispatchError;
use crate::gate::AdmissionGate;
use crate::intake::{IntakeError, IntakeService};
use crate::model::{DispatchOptions, RunReport, RunResult};
use crate::output::write_variant;
use crate::planner::{GenerationUnit, plan_distribution};
use crate::variation::VariationEngine;

const FILE_PROGRESS_EVERY: u64 = 100;
const SERVICE_PROGRESS_EVERY: u64 = 50;

/// Where generated variants go.
#[derive(Clone)]
pub enum Destination {
    /// One pretty JSON file per variant under `out_dir`.
    Files { out_dir: PathBuf },
    /// Upload to an intake service, each under a randomly chosen EHR.
    Service(Arc<dyn IntakeService>),
}

impl Destination {
    pub fn mode(&self) -> &'static str {
        match self {
            Destination::Files { .. } => "file",
            Destination::Service(_) => "api",
        }
    }
}

#[derive(Debug, Error)]
enum DeliveryError {
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Intake(#[from] IntakeError),
    #[error("no EHR available")]
    NoEhr,
}

/// Fans generation + delivery out over many concurrent tasks.
pub struct Dispatcher {
    engine: Arc<VariationEngine>,
    destination: Destination,
    options: DispatchOptions,
}

struct DeliveryContext {
    engine: Arc<VariationEngine>,
    destination: Destination,
    gate: AdmissionGate,
    result: Arc<RunResult>,
    ehr_ids: Arc<[String]>,
    timeout: Duration,
    progress_every: u64,
}

impl Dispatcher {
    pub fn new(
        engine: Arc<VariationEngine>,
        destination: Destination,
        options: DispatchOptions,
    ) -> Self {
        Self {
            engine,
            destination,
            options,
        }
    }

    pub fn options(&self) -> &DispatchOptions {
        &self.options
    }

    /// Plan, prepare the destination, deliver every unit and report.
    ///
    /// Fails before any delivery starts when there are no templates, the
    /// plan precondition does not hold, or no EHR could be created. Failed
    /// deliveries do not fail the run; they show up in the report.
    pub async fn run(&self, templates: &[Template]) -> Result<RunReport, DispatchError> {
        if self.options.concurrency == 0 {
            return Err(DispatchError::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }

        let start = Instant::now();
        let run_id = self
            .options
            .run_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let seed = self
            .options
            .seed
            .unwrap_or_else(|| rand::rng().random::<u64>());
        let mode = self.destination.mode();

        let mut planner_rng = ChaCha8Rng::seed_from_u64(seed);
        let units = plan_distribution(
            templates,
            self.options.total,
            self.options.policy,
            &mut planner_rng,
        )?;

        info!(
            run_id = %run_id,
            mode,
            templates = units.len(),
            total = self.options.total,
            concurrency = self.options.concurrency,
            seed,
            "generation started"
        );
        for unit in &units {
            info!(template = %unit.template.name(), count = unit.count, "template planned");
        }

        let ehr_ids = self.prepare_destination().await?;

        let gate = AdmissionGate::new(self.options.concurrency);
        let result = Arc::new(RunResult::new(&units));
        let context = Arc::new(DeliveryContext {
            engine: Arc::clone(&self.engine),
            destination: self.destination.clone(),
            gate: gate.clone(),
            result: Arc::clone(&result),
            ehr_ids: Arc::clone(&ehr_ids),
            timeout: Duration::from_secs(self.options.delivery_timeout_secs.max(1)),
            progress_every: self.options.progress_every.unwrap_or(match self.destination {
                Destination::Files { .. } => FILE_PROGRESS_EVERY,
                Destination::Service(_) => SERVICE_PROGRESS_EVERY,
            }),
        });

        let mut tasks = JoinSet::new();
        let mut task_templates: HashMap<task::Id, (String, usize)> = HashMap::new();
        for GenerationUnit { template, count } in units {
            for index in 0..count {
                let unit_seed = hash_unit_seed(hash_seed(seed, template.name()), index as u64);
                let handle = tasks.spawn(deliver_unit(
                    Arc::clone(&context),
                    template.clone(),
                    index,
                    unit_seed,
                ));
                task_templates.insert(handle.id(), (template.name().to_string(), index));
            }
        }

        // A task that died before recording still counts as a failed unit.
        while let Some(joined) = tasks.join_next().await {
            let Err(err) = joined else {
                continue;
            };
            match task_templates.get(&err.id()) {
                Some((template, index)) => {
                    warn!(
                        run_id = %run_id,
                        template = %template,
                        index,
                        error = %err,
                        "delivery task aborted"
                    );
                    result.record(template, false);
                }
                None => warn!(run_id = %run_id, error = %err, "delivery task aborted"),
            }
        }

        let attempted = result.attempted();
        let succeeded = result.succeeded();
        let report = RunReport {
            run_id: run_id.clone(),
            mode: mode.to_string(),
            seed,
            requested: self.options.total as u64,
            attempted,
            succeeded,
            failed: attempted.saturating_sub(succeeded),
            templates: result.templates(),
            ehrs_requested: match self.destination {
                Destination::Files { .. } => 0,
                Destination::Service(_) => self.options.ehr_count as u64,
            },
            ehrs_created: ehr_ids.len() as u64,
            concurrency: gate.capacity() as u64,
            peak_in_flight: gate.peak() as u64,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            run_id = %run_id,
            mode,
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failed,
            duration_ms = report.duration_ms,
            "generation finished"
        );

        Ok(report)
    }

    /// Create the output directory, or the EHR containers every upload
    /// samples from. EHR creation completes before this returns.
    async fn prepare_destination(&self) -> Result<Arc<[String]>, DispatchError> {
        match &self.destination {
            Destination::Files { out_dir } => {
                tokio::fs::create_dir_all(out_dir).await?;
                Ok(Arc::from(Vec::new()))
            }
            Destination::Service(service) => {
                let requested = self.options.ehr_count;
                info!(requested, "creating EHRs");
                let ids = create_ehrs(service, requested).await;
                if ids.is_empty() {
                    return Err(DispatchError::NoEhrIds { requested });
                }
                info!(requested, created = ids.len(), "EHRs ready");
                Ok(Arc::from(ids))
            }
        }
    }
}

/// Create `count` EHRs concurrently. Failures are logged and skipped.
pub async fn create_ehrs(service: &Arc<dyn IntakeService>, count: usize) -> Vec<String> {
    let mut tasks = JoinSet::new();
    for _ in 0..count {
        let service = Arc::clone(service);
        tasks.spawn(async move { service.create_ehr().await });
    }

    let mut ids = Vec::with_capacity(count);
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(ehr_id)) => {
                info!(ehr_id = %ehr_id, "EHR created");
                ids.push(ehr_id);
            }
            Ok(Err(err)) => warn!(status = ?err.status(), error = %err, "EHR creation failed"),
            Err(err) => warn!(error = %err, "EHR creation task aborted"),
        }
    }
    ids
}

async fn deliver_unit(context: Arc<DeliveryContext>, template: Template, index: usize, seed: u64) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let variant = context.engine.vary(template.document(), &mut rng);
    let ehr_id = if context.ehr_ids.is_empty() {
        None
    } else {
        Some(context.ehr_ids[rng.random_range(0..context.ehr_ids.len())].clone())
    };

    let outcome = match context.gate.acquire().await {
        Ok(_permit) => {
            tokio::time::timeout(
                context.timeout,
                deliver(&context.destination, &template, index, &variant, ehr_id.as_deref()),
            )
            .await
        }
        Err(err) => {
            warn!(template = %template.name(), index, error = %err, "admission gate closed");
            context.result.record(template.name(), false);
            return;
        }
    };

    let delivered = match outcome {
        Ok(Ok(())) => true,
        Ok(Err(err)) => {
            let status = match &err {
                DeliveryError::Intake(intake) => intake.status(),
                _ => None,
            };
            warn!(
                template = %template.name(),
                index,
                ehr_id = ehr_id.as_deref().unwrap_or(""),
                status = ?status,
                error = %err,
                "delivery failed"
            );
            false
        }
        Err(_) => {
            warn!(
                template = %template.name(),
                index,
                timeout_secs = context.timeout.as_secs(),
                "delivery timed out"
            );
            false
        }
    };

    let processed = context.result.record(template.name(), delivered);
    if context.progress_every > 0 && processed % context.progress_every == 0 {
        info!(
            event = "progress",
            mode = context.destination.mode(),
            processed,
            succeeded = context.result.succeeded(),
            "units processed"
        );
    }
}

async fn deliver(
    destination: &Destination,
    template: &Template,
    index: usize,
    variant: &Value,
    ehr_id: Option<&str>,
) -> Result<(), DeliveryError> {
    match destination {
        Destination::Files { out_dir } => {
            write_variant(out_dir, template, index, variant).await?;
            Ok(())
        }
        Destination::Service(service) => {
            let ehr_id = ehr_id.ok_or(DeliveryError::NoEhr)?;
            service.submit_composition(ehr_id, variant).await?;
            Ok(())
        }
    }
}

fn hash_seed(seed: u64, key: &str) -> u64 {
    let mut hash = seed ^ 0xcbf29ce484222325;
    for byte in key.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

fn hash_unit_seed(template_seed: u64, index: u64) -> u64 {
    let hash = template_seed ^ index.wrapping_mul(0x9e3779b97f4a7c15);
    hash.wrapping_mul(0x100000001b3)
}
