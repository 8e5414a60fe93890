use thiserror::Error;

/// Validation failures for domain types
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("tender url must not be empty")]
    EmptyUrl,

    #[error("invalid budget value: {0}")]
    InvalidBudget(f64),

    #[error("budget_min ({min}) exceeds budget_max ({max})")]
    BudgetRange { min: f64, max: f64 },

    #[error("preferred min_budget ({min}) exceeds max_budget ({max})")]
    ProjectSize { min: f64, max: f64 },

    #[error("invalid site: {0}")]
    Site(String),

    #[error("failed to parse {what}: {reason}")]
    Parse { what: &'static str, reason: String },
}
