use thiserror::Error;

/// Errors that stop a generation run before or while dispatching.
///
/// Per-unit delivery failures are not errors here: they are recorded in the
/// run report and the run carries on.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no templates to generate from")]
    NoTemplates,
    #[error("no EHR identifiers available: {requested} requested, none created")]
    NoEhrIds { requested: usize },
    #[error(
        "random partition needs a total greater than the template count ({templates}), got {total}"
    )]
    PartitionTooSmall { total: usize, templates: usize },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Core(#[from] synthehr_core::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("http client error: {0}")]
    Client(#[from] reqwest::Error),
}
