use thiserror::Error;

/// Construction-time errors. The point and range operations never fail.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("initial tree layout must contain at least one base node")]
    EmptyInitialLayout,
    #[error("initial node at index {child} declares parent {parent} but that parent does not list it as a child")]
    InconsistentParentLink { parent: usize, child: usize },
    #[error("tree configuration is invalid: low_cont ({low_cont}) must be less than high_cont ({high_cont})")]
    BadContentionBounds { low_cont: i32, high_cont: i32 },
    #[error("tree configuration is invalid: {field} must be non-negative, got {value}")]
    NegativeContribution { field: &'static str, value: i32 },
}

pub type TreeResult<T> = Result<T, TreeError>;
