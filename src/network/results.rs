use super::Table;

/// Bus result. `p_mw`/`q_mvar` are the net power drawn by all elements at the bus.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BusResult {
    pub vm_pu: f64,
    pub va_degree: f64,
    pub p_mw: f64,
    pub q_mvar: f64,
}

/// Power flow over a two-port element, measured into the element at each side.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BranchResult {
    pub p_from_mw: f64,
    pub q_from_mvar: f64,
    pub p_to_mw: f64,
    pub q_to_mvar: f64,
    pub pl_mw: f64,
    pub ql_mvar: f64,
}

/// Power of a single-bus element.
///
/// Loads, storage, shunts and (x)wards use the load convention; sgens, gens and ext grids
/// use the generator convention.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PQResult {
    pub p_mw: f64,
    pub q_mvar: f64,
}

impl PQResult {
    pub fn new(p_mw: f64, q_mvar: f64) -> Self {
        Self { p_mw, q_mvar }
    }
}

/// Results snapshot written by a converged power flow.
#[derive(Debug, Clone, Default)]
pub struct NetResults {
    pub bus: Table<BusResult>,
    pub line: Table<BranchResult>,
    pub trafo: Table<BranchResult>,
    pub impedance: Table<BranchResult>,
    pub load: Table<PQResult>,
    pub sgen: Table<PQResult>,
    pub generator: Table<PQResult>,
    pub storage: Table<PQResult>,
    pub ext_grid: Table<PQResult>,
    pub shunt: Table<PQResult>,
    pub ward: Table<PQResult>,
    pub xward: Table<PQResult>,
}
