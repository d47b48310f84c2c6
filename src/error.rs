//! Error types shared by the network model, the power flow and the equivalent pipeline.

use thiserror::Error;

/// Errors raised by the element creation/deletion primitives of [`crate::network::Network`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NetworkError {
    #[error("{element} refers to bus {bus} which does not exist")]
    UnknownBus { element: &'static str, bus: i64 },

    #[error("{element} {index} does not exist")]
    UnknownElement { element: &'static str, index: i64 },
}

/// Errors raised while building or solving the power flow problem.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PowerFlowError {
    #[error("power flow did not converge in {iterations} iterations (mismatch {mismatch:.3e} pu)")]
    NotConverged { iterations: usize, mismatch: f64 },

    #[error("linear solve failed: {0}")]
    LinearSolve(&'static str),

    #[error("no in-service reference bus (ext_grid or slack gen) found")]
    NoReferenceBus,
}

/// Errors raised by the network equivalent pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EquivalentError {
    #[error(
        "Ybus and the resolved buses have different length ({resolved} > {ybus_size}); \
         some internal or boundary buses are possibly isolated or out of service"
    )]
    IndexInconsistency { resolved: usize, ybus_size: usize },

    #[error("bus {bus} has no solver index of its own")]
    UnresolvedBus { bus: i64 },

    #[error(
        "no voltage result for boundary bus {bus}; the equivalent power cannot be \
         calculated without a solved network"
    )]
    MissingPriorSolution { bus: i64 },

    #[error("more than one reference source is connected to bus {bus}")]
    DuplicateReferenceSource { bus: i64 },

    #[error("invalid bus partition: {0}")]
    InvalidPartition(String),

    #[error("the external block of the admittance matrix is singular")]
    SingularExternalBlock,

    #[error("the network has not been solved, no admittance matrix is available")]
    MissingSolverState,

    #[error(transparent)]
    PowerFlow(#[from] PowerFlowError),

    #[error(transparent)]
    Network(#[from] NetworkError),
}
