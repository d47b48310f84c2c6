//! Kron reduction of the solver admittance matrix onto the boundary buses.

use std::collections::HashSet;

use nalgebra::DMatrix;
use nalgebra_sparse::convert::serial::convert_csc_dense;
use num_complex::Complex64;
use tracing::debug;

use super::lookup::get_solver_buses;
use crate::basic::system::SolverInternals;
use crate::error::EquivalentError;

/// Admittance matrix of the external area seen from the boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct ReducedNetwork {
    /// `Y_eq`, rows and columns in the order of `boundary`.
    pub y_eq: DMatrix<Complex64>,
    pub boundary: Vec<i64>,
    /// Solver bus of each boundary bus.
    pub solver_bus: Vec<usize>,
}

/// Eliminates the `eliminate` rows/columns of `ybus`:
/// `Y_eq = Y_kk - Y_ke * Y_ee^-1 * Y_ek`.
pub fn kron_reduction(
    ybus: &DMatrix<Complex64>,
    keep: &[usize],
    eliminate: &[usize],
) -> Result<DMatrix<Complex64>, EquivalentError> {
    let ykk = ybus.select_rows(keep).select_columns(keep);
    if eliminate.is_empty() {
        return Ok(ykk);
    }
    let yke = ybus.select_rows(keep).select_columns(eliminate);
    let yek = ybus.select_rows(eliminate).select_columns(keep);
    let yee = ybus.select_rows(eliminate).select_columns(eliminate);

    let x = yee.lu().solve(&yek).ok_or(EquivalentError::SingularExternalBlock)?;
    let y_eq = ykk - yke * x;
    if y_eq.iter().any(|y| !(y.re.is_finite() && y.im.is_finite())) {
        return Err(EquivalentError::SingularExternalBlock);
    }
    Ok(y_eq)
}

/// Reduces the solved network in `internals` onto `boundary`.
///
/// Every solver bus that is not a boundary bus is eliminated: the energised `external`
/// buses, the auxiliary buses next to them or next to the boundary, and buses reachable
/// through neither list.
pub fn calculate_equivalent_ybus(
    internals: &SolverInternals,
    boundary: &[i64],
    external: &[i64],
) -> Result<ReducedNetwork, EquivalentError> {
    let b_idx = get_solver_buses(internals, boundary, external)?;
    let e_idx = get_solver_buses(internals, external, boundary)?;

    let keep = b_idx[b_idx.len() - boundary.len()..].to_vec();
    let kept: HashSet<usize> = keep.iter().copied().collect();
    if e_idx.iter().any(|i| kept.contains(i)) {
        return Err(EquivalentError::InvalidPartition(
            "a boundary bus shares its solver bus with an external bus".to_owned(),
        ));
    }
    let mut eliminate = e_idx.clone();
    let mut seen: HashSet<usize> = e_idx.into_iter().collect();
    let n = internals.ybus.nrows();
    for i in b_idx.iter().copied().chain(0..n) {
        if !kept.contains(&i) && seen.insert(i) {
            eliminate.push(i);
        }
    }
    debug!(
        boundary = keep.len(),
        eliminated = eliminate.len(),
        "kron reduction"
    );

    let dense = convert_csc_dense(&internals.ybus);
    let y_eq = kron_reduction(&dense, &keep, &eliminate)?;
    Ok(ReducedNetwork {
        y_eq,
        boundary: boundary.to_vec(),
        solver_bus: keep,
    })
}
