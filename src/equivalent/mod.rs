//! Ward and extended ward network equivalents.
//!
//! [`get_equivalent`] replaces the external area of a solved network by elements attached to
//! the boundary buses only. It runs on a copy of the network:
//!
//! 1. The internal area is removed and every boundary bus is held at its solved voltage to
//!    record the power the boundary needs ([`power::calc_required_power`]).
//! 2. All injections of the external area become constant admittances
//!    ([`passive::create_passive_external_net`]).
//! 3. The admittance matrix is Kron reduced onto the boundary ([`kron`]) and translated into
//!    shunts and transfer impedances ([`params`]).
//! 4. The external area is swapped for those elements ([`replace::replace_external_area`]) and
//!    the ward powers are set so the boundary power matches step 1.
//!
//! The equivalent is finally merged into a copy of the caller's internal area.

pub mod kron;
pub mod lookup;
pub mod params;
pub mod partition;
pub mod passive;
pub mod power;
pub mod replace;

use std::collections::{BTreeSet, HashSet};

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::basic::{PowerFlowConfig, RunPF};
use crate::error::EquivalentError;
use crate::network::Network;

pub use kron::{calculate_equivalent_ybus, kron_reduction, ReducedNetwork};
pub use lookup::get_solver_buses;
pub use params::{
    BoundaryParameters, EquivalentParameters, EquivalentType, ImpedanceParameter, WardParameter,
    XWardParameter,
};
pub use partition::BusPartition;
pub use power::BoundaryPower;
pub use replace::CreatedElements;

/// Configuration of an equivalent run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EquivalentConfig {
    pub eq_type: EquivalentType,
    /// Used for every intermediate solve.
    pub power_flow: PowerFlowConfig,
    /// Boundary pairs with a weaker coupling get no transfer impedance.
    pub coupling_tol: f64,
    /// Transfer impedances with all components below this become a closed bus-bus switch.
    pub bypass_tol: f64,
}

impl Default for EquivalentConfig {
    fn default() -> Self {
        Self {
            eq_type: EquivalentType::Ward,
            power_flow: PowerFlowConfig::default(),
            coupling_tol: 1e-10,
            bypass_tol: 1e-8,
        }
    }
}

impl EquivalentConfig {
    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Result of [`get_equivalent`].
#[derive(Debug, Clone)]
pub struct Equivalent {
    /// Internal area, boundary and equivalent elements. Not solved.
    pub net: Network,
    /// Parameters of the equivalent, including the calibrated ward powers.
    pub parameters: EquivalentParameters,
    /// Power the boundary buses drew from the external area before the reduction.
    pub boundary_power: Vec<BoundaryPower>,
    /// Indices of the equivalent elements in `net`.
    pub created: CreatedElements,
}

/// Energised external buses, one per solver bus.
fn energised_external(
    net: &Network,
    external: &BTreeSet<i64>,
) -> Result<Vec<i64>, EquivalentError> {
    let internals = net.internal.as_ref().ok_or(EquivalentError::MissingSolverState)?;
    let mut seen = HashSet::new();
    Ok(external
        .iter()
        .copied()
        .filter(|b| {
            internals
                .bus_lookup
                .get(b)
                .is_some_and(|&idx| seen.insert(idx))
        })
        .collect())
}

/// Computes a Ward or extended Ward equivalent of everything outside `internal` and
/// `boundary`.
///
/// `net` must hold the results of a converged power flow. It is not modified.
#[instrument(skip_all, fields(eq_type = ?cfg.eq_type, boundary = boundary.len()))]
pub fn get_equivalent<S: RunPF>(
    net: &Network,
    boundary: &[i64],
    internal: &[i64],
    cfg: &EquivalentConfig,
    solver: &mut S,
) -> Result<Equivalent, EquivalentError> {
    let partition = BusPartition::new(net, boundary, internal)?;
    let pf = &cfg.power_flow;
    if !pf.calculate_voltage_angles {
        warn!("voltage angles are not calculated, the boundary power will not be matched exactly");
    }
    info!(
        internal = partition.internal.len(),
        external = partition.external.len(),
        "computing network equivalent"
    );

    let mut ext_net = net.clone();
    ext_net.drop_buses(&partition.internal);
    let required = power::calc_required_power(&mut ext_net, &partition.boundary, pf, solver)?;

    let scaffolding =
        passive::create_passive_external_net(&mut ext_net, &partition.external, pf, solver)?;
    let mut external = partition.external.clone();
    external.extend(scaffolding.iter().copied());

    let reduced = {
        let internals = ext_net.internal.as_ref().ok_or(EquivalentError::MissingSolverState)?;
        let energised = energised_external(&ext_net, &external)?;
        calculate_equivalent_ybus(internals, &partition.boundary, &energised)?
    };
    let mut parameters =
        params::calc_parameters(&ext_net, &reduced, cfg.eq_type, cfg.coupling_tol)?;

    // The scaffolding buses go together with the external area.
    let created = replace::replace_external_area(
        &mut ext_net,
        &partition.boundary_inclusive,
        &external,
        &parameters,
        cfg.bypass_tol,
        pf,
        solver,
    )?;
    let present = power::measure_boundary_power(&ext_net, &partition.boundary)?;
    let setpoints = power::apply_equivalent_power(&mut ext_net, &created, &required, &present);
    for w in parameters.boundary.wards_mut() {
        if let Some(&(p, q)) = setpoints.get(&w.bus) {
            w.power = Complex64::new(p, q);
        }
    }

    let (merged, created) = merge(net, &partition, &ext_net, &created)?;
    info!(
        impedances = created.impedance.len(),
        switches = created.switch.len(),
        "network equivalent done"
    );
    Ok(Equivalent {
        net: merged,
        parameters,
        boundary_power: required,
        created,
    })
}

/// Copies the caller's internal area and boundary and adds the equivalent elements of
/// `reduced_net`. Returns the merged network and the new element indices.
fn merge(
    net: &Network,
    partition: &BusPartition,
    reduced_net: &Network,
    created: &CreatedElements,
) -> Result<(Network, CreatedElements), EquivalentError> {
    let boundary = &partition.boundary_inclusive;
    let mut merged = net.clone();
    merged.drop_buses(&partition.external);
    merged.drop_internal_branch_elements(boundary);
    merged.drop_shunts_at(boundary);
    merged.drop_wards_at(boundary);
    merged.clear_results();

    let mut out = CreatedElements::default();
    for idx in &created.impedance {
        if let Some(e) = reduced_net.impedance.get(idx) {
            out.impedance.push(merged.create_impedance(e.clone())?);
        }
    }
    for idx in &created.switch {
        if let Some(e) = reduced_net.switch.get(idx) {
            out.switch.push(merged.create_switch(e.clone())?);
        }
    }
    for idx in &created.ward {
        if let Some(e) = reduced_net.ward.get(idx) {
            out.ward.push(merged.create_ward(e.clone())?);
        }
    }
    for idx in &created.xward {
        if let Some(e) = reduced_net.xward.get(idx) {
            out.xward.push(merged.create_xward(e.clone())?);
        }
    }
    Ok((merged, out))
}
