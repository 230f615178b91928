//! Variant generation and delivery engine for synthehr.
//!
//! This crate takes canonical templates, plans how many variants each one
//! contributes, randomizes deep copies of them and delivers the copies to
//! a directory or an openEHR-style intake service under bounded concurrency.

pub mod coded;
pub mod dispatcher;
pub mod errors;
pub mod gate;
pub mod intake;
pub mod model;
pub mod output;
pub mod planner;
pub mod text;
pub mod variation;

pub use coded::CodedTextTable;
pub use dispatcher::{Destination, Dispatcher, create_ehrs};
pub use errors::DispatchError;
pub use gate::{AdmissionGate, DEFAULT_CAPACITY, GatePermit};
pub use intake::{HttpIntake, IntakeConfig, IntakeError, IntakeService};
pub use model::{DispatchOptions, RunReport, RunResult, TemplateCounts};
pub use planner::{DistributionPolicy, GenerationUnit, plan_distribution};
pub use text::{AnalyzedToken, LexiconAnalyzer, TextAnalysisError, TextAnalyzer, Thesaurus};
pub use variation::{VariationEngine, VariationOptions};
