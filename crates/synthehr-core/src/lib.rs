//! Core contracts and helpers for synthehr.
//!
//! This crate defines the Document Tree model, the canonicalizer that
//! brings heterogeneous clinical documents into one schema-consistent shape,
//! and the template loader shared by the generator and the CLI.

pub mod canonical;
pub mod document;
pub mod error;
pub mod redaction;
pub mod template;

pub use canonical::{canonicalize, normalize_date_time, parse_magnitude};
pub use document::{NodeKind, NodeVisitor, TYPE_FIELD, into_sequence, walk_mut};
pub use error::{Error, Result};
pub use redaction::{RedactedEndpoint, redact_endpoint};
pub use template::{Template, discover_files, load_templates};
