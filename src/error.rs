use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HarnessError {
    #[error("shape {shape:?} holds {expected} elements, got {actual}")]
    ElementCount {
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },
    #[error("expected a 2-D matrix, got shape {0:?}")]
    NotAMatrix(Vec<usize>),
    #[error("inner dimensions differ: lhs is {lhs:?}, rhs is {rhs:?}")]
    InnerDimMismatch { lhs: Vec<usize>, rhs: Vec<usize> },
    #[error("tolerances must be finite and non-negative, got rtol={relative} atol={absolute}")]
    InvalidTolerance { relative: f64, absolute: f64 },
    #[error("could not parse {var}={value:?}")]
    InvalidEnv { var: &'static str, value: String },
    #[error("{0} does not match the reference implementation")]
    Mismatch(String),
}
