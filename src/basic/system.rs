pub mod admittance;
pub(crate) mod model;
pub(crate) mod results;
pub mod topology;

pub use admittance::{Admittance, BranchStamp};
pub use model::SolverInternals;
pub use topology::{BranchKind, SolverBranch};
