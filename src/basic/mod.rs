pub(crate) mod dsbus_dv;
pub(crate) mod newtonpf;

pub mod runpp;
pub mod solver;
pub(crate) mod sparse;
pub mod system;

pub use newtonpf::newton_pf;
pub use runpp::{InitMode, NewtonPF, PowerFlowConfig, PowerFlowSummary, RunPF};
