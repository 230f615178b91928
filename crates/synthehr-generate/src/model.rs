use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::gate::DEFAULT_CAPACITY;
use crate::planner::{DistributionPolicy, GenerationUnit};

/// Options for a dispatch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchOptions {
    /// Variants to produce across all templates.
    pub total: usize,
    pub policy: DistributionPolicy,
    /// Gate capacity: deliveries allowed in flight at once.
    pub concurrency: usize,
    /// Base seed for every random choice; drawn from the OS when absent.
    pub seed: Option<u64>,
    /// EHR containers to create before delivering (service destinations only).
    pub ehr_count: usize,
    /// Bound on a single delivery call.
    pub delivery_timeout_secs: u64,
    /// Emit a progress event every N processed units; mode default when absent.
    pub progress_every: Option<u64>,
    /// Identifier stamped on the report and log events; generated when absent.
    pub run_id: Option<String>,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            total: 0,
            policy: DistributionPolicy::Proportional,
            concurrency: DEFAULT_CAPACITY,
            seed: None,
            ehr_count: 0,
            delivery_timeout_secs: 60,
            progress_every: None,
            run_id: None,
        }
    }
}

/// Per-template delivery counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateCounts {
    pub planned: u64,
    pub attempted: u64,
    pub succeeded: u64,
}

impl TemplateCounts {
    pub fn failed(&self) -> u64 {
        self.attempted.saturating_sub(self.succeeded)
    }
}

/// Shared outcome aggregate written by every delivery task.
#[derive(Debug, Default)]
pub struct RunResult {
    attempted: AtomicU64,
    succeeded: AtomicU64,
    templates: Mutex<BTreeMap<String, TemplateCounts>>,
}

impl RunResult {
    /// Start every planned template at zero so it shows up in the report
    /// even when nothing for it succeeds.
    pub fn new(units: &[GenerationUnit]) -> Self {
        let templates = units
            .iter()
            .map(|unit| {
                let counts = TemplateCounts {
                    planned: unit.count as u64,
                    ..TemplateCounts::default()
                };
                (unit.template.name().to_string(), counts)
            })
            .collect();
        Self {
            attempted: AtomicU64::new(0),
            succeeded: AtomicU64::new(0),
            templates: Mutex::new(templates),
        }
    }

    /// Record one finished unit; returns the number of units processed so far.
    pub fn record(&self, template: &str, delivered: bool) -> u64 {
        {
            let mut templates = self.templates.lock().unwrap_or_else(PoisonError::into_inner);
            let counts = templates.entry(template.to_string()).or_default();
            counts.attempted += 1;
            if delivered {
                counts.succeeded += 1;
            }
        }
        if delivered {
            self.succeeded.fetch_add(1, Ordering::SeqCst);
        }
        self.attempted.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn attempted(&self) -> u64 {
        self.attempted.load(Ordering::SeqCst)
    }

    pub fn succeeded(&self) -> u64 {
        self.succeeded.load(Ordering::SeqCst)
    }

    pub fn template(&self, name: &str) -> Option<TemplateCounts> {
        self.templates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn templates(&self) -> BTreeMap<String, TemplateCounts> {
        self.templates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Final summary of a dispatch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub mode: String,
    pub seed: u64,
    pub requested: u64,
    pub attempted: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub templates: BTreeMap<String, TemplateCounts>,
    pub ehrs_requested: u64,
    pub ehrs_created: u64,
    pub concurrency: u64,
    pub peak_in_flight: u64,
    pub duration_ms: u64,
}

impl RunReport {
    /// Units that never reached a recorded outcome.
    pub fn unaccounted(&self) -> u64 {
        self.requested.saturating_sub(self.attempted)
    }
}
