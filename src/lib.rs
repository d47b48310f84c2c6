pub mod basic;
pub mod equivalent;
pub mod error;
pub mod network;
pub mod testcases;
pub mod prelude {
    pub use crate::basic::{InitMode, NewtonPF, PowerFlowConfig, PowerFlowSummary, RunPF};
    pub use crate::equivalent::{
        get_equivalent, BoundaryParameters, Equivalent, EquivalentConfig, EquivalentParameters,
        EquivalentType,
    };
    pub use crate::error::{EquivalentError, NetworkError, PowerFlowError};
    pub use crate::network::*;
}
