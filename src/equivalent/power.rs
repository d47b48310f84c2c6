//! Calibration of the equivalent injections against the pre-reduction boundary power.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, warn};

use super::replace::CreatedElements;
use crate::basic::{PowerFlowConfig, RunPF};
use crate::error::EquivalentError;
use crate::network::*;

const ASSIST_EXT_GRID: &str = "assist_ext_grid";

/// Power delivered into a boundary bus by its reference sources (generator convention).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryPower {
    pub bus: i64,
    pub p_mw: f64,
    pub q_mvar: f64,
}

/// Reference sources at `bus` or at any bus fused to it by a closed bus-bus switch.
fn boundary_sources(net: &Network, bus: i64) -> Vec<ReferenceSource> {
    net.fused_buses(bus, &BTreeSet::new())
        .into_iter()
        .flat_map(|b| net.reference_sources(b))
        .collect()
}

/// Fails if any of `buses` has more than one in-service reference source.
pub fn check_single_reference(net: &Network, buses: &[i64]) -> Result<(), EquivalentError> {
    for &bus in buses {
        if boundary_sources(net, bus).len() > 1 {
            return Err(EquivalentError::DuplicateReferenceSource { bus });
        }
    }
    Ok(())
}

/// Pins every boundary bus without a reference source to its solved voltage with an ext grid.
/// Returns the indices of the created ext grids.
pub fn add_assist_ext_grids(
    net: &mut Network,
    boundary: &[i64],
) -> Result<Vec<i64>, EquivalentError> {
    let mut created = Vec::new();
    for &bus in boundary {
        let (vm, va) = net
            .bus_voltage(bus)
            .ok_or(EquivalentError::MissingPriorSolution { bus })?;
        if !boundary_sources(net, bus).is_empty() {
            continue;
        }
        let mut eg = ExtGrid::new(bus, vm, va);
        eg.name = Some(ASSIST_EXT_GRID.to_owned());
        created.push(net.create_ext_grid(eg)?);
    }
    debug!(count = created.len(), "assist ext grids added");
    Ok(created)
}

/// Reads the power of the reference sources at each boundary bus from the last solve.
pub fn measure_boundary_power(
    net: &Network,
    boundary: &[i64],
) -> Result<Vec<BoundaryPower>, EquivalentError> {
    let res = net.res.as_ref().ok_or(EquivalentError::MissingSolverState)?;
    boundary
        .iter()
        .map(|&bus| {
            if !res.bus.contains_key(&bus) {
                return Err(EquivalentError::MissingPriorSolution { bus });
            }
            let (mut p_mw, mut q_mvar) = (0.0, 0.0);
            for src in boundary_sources(net, bus) {
                if let Some(pq) = src.power(res) {
                    p_mw += pq.p_mw;
                    q_mvar += pq.q_mvar;
                }
            }
            Ok(BoundaryPower { bus, p_mw, q_mvar })
        })
        .collect()
}

/// First calibration step, run on the network without its internal area.
///
/// Every boundary bus is held at its solved voltage by a reference source (an assist ext
/// grid if it has none), the network is re-solved and the power each boundary bus then
/// needs from outside is returned.
pub fn calc_required_power<S: RunPF>(
    net: &mut Network,
    boundary: &[i64],
    cfg: &PowerFlowConfig,
    solver: &mut S,
) -> Result<Vec<BoundaryPower>, EquivalentError> {
    for &bus in boundary {
        if net.bus_voltage(bus).is_none() {
            return Err(EquivalentError::MissingPriorSolution { bus });
        }
    }
    check_single_reference(net, boundary)?;
    add_assist_ext_grids(net, boundary)?;
    solver.run_pf(net, cfg)?;
    measure_boundary_power(net, boundary)
}

/// Last calibration step: sets `ps`/`qs` of the created wards (or xwards) to the power still
/// missing at their bus, `required - present`. Returns the setpoint per bus.
pub fn apply_equivalent_power(
    net: &mut Network,
    created: &CreatedElements,
    required: &[BoundaryPower],
    present: &[BoundaryPower],
) -> HashMap<i64, (f64, f64)> {
    let present: HashMap<i64, &BoundaryPower> = present.iter().map(|p| (p.bus, p)).collect();
    let setpoints: HashMap<i64, (f64, f64)> = required
        .iter()
        .filter_map(|r| {
            let p = present.get(&r.bus)?;
            Some((r.bus, (r.p_mw - p.p_mw, r.q_mvar - p.q_mvar)))
        })
        .collect();

    for idx in &created.ward {
        if let Some(w) = net.ward.get_mut(idx) {
            match setpoints.get(&w.bus) {
                Some(&(p, q)) => (w.ps_mw, w.qs_mvar) = (p, q),
                None => warn!(bus = w.bus, "no boundary power for ward"),
            }
        }
    }
    for idx in &created.xward {
        if let Some(w) = net.xward.get_mut(idx) {
            match setpoints.get(&w.bus) {
                Some(&(p, q)) => (w.ps_mw, w.qs_mvar) = (p, q),
                None => warn!(bus = w.bus, "no boundary power for xward"),
            }
        }
    }
    setpoints
}
