use std::f64::consts::PI;

use super::{dsbus_dv::dSbus_dV, solver::Solve};
use crate::error::PowerFlowError;

use nalgebra::DVector;
use nalgebra_sparse::{CooMatrix, CscMatrix};
use num_complex::Complex64;
use tracing::{debug, trace};

/// Newton-Raphson power flow in polar coordinates.
///
/// Buses must be ordered `[pv.., pq.., slack..]`. The returned voltage vector has the same
/// order, together with the number of iterations used. Convergence is reached when the
/// largest active or reactive mismatch drops below `tolerance` (per unit).
#[allow(non_snake_case)]
pub fn newton_pf<Solver: Solve>(
    Ybus: &CscMatrix<Complex64>,
    Sbus: &DVector<Complex64>,
    v_init: &DVector<Complex64>,
    npv: usize,
    npq: usize,
    tolerance: Option<f64>,
    max_iter: Option<usize>,
    solver: &mut Solver,
) -> Result<(DVector<Complex64>, usize), PowerFlowError> {
    let mut v = v_init.clone();
    let max_iter = max_iter.unwrap_or(100);
    let tol = tolerance.unwrap_or(1e-8);

    let n_bus = npq + npv;
    let num_state = npv + 2 * npq;

    let mut mis = v.component_mul(&(Ybus * &v).conjugate()) - Sbus;
    let mut F = DVector::zeros(num_state);
    assemble_f(&mut F, n_bus, &mis, num_state, npv);
    if num_state == 0 || F.amax() < tol {
        return Ok((v, 0));
    }

    let mut v_m = v.map(|e| e.norm());
    let mut v_a = v.map(|e| e.arg());

    for iterations in 1..=max_iter {
        let (dS_dVm, dS_dVa) = dSbus_dV(Ybus, &v);
        let jacobian = build_jacobian(&dS_dVm, &dS_dVa, npv, n_bus);

        let (mut Ap, mut Ai, mut Ax) = jacobian.disassemble();
        solver
            .solve(&mut Ap, &mut Ai, &mut Ax, F.as_mut_slice(), num_state)
            .map_err(PowerFlowError::LinearSolve)?;

        update_v(&mut v_a, &F, n_bus, &mut v_m, npv, num_state, &mut v);

        mis = v.component_mul(&(Ybus * &v).conjugate()) - Sbus;
        assemble_f(&mut F, n_bus, &mis, num_state, npv);

        let mismatch = F.amax();
        trace!(iterations, mismatch, "newton step");
        if !mismatch.is_finite() {
            return Err(PowerFlowError::NotConverged { iterations, mismatch });
        }
        if mismatch < tol {
            debug!(iterations, mismatch, "power flow converged");
            return Ok((v, iterations));
        }
    }
    Err(PowerFlowError::NotConverged {
        iterations: max_iter,
        mismatch: F.amax(),
    })
}

/// Mismatch vector `[dP(pv, pq); dQ(pq)]`.
#[inline(always)]
fn assemble_f(
    f: &mut DVector<f64>,
    n_bus: usize,
    mis: &DVector<Complex64>,
    num_state: usize,
    npv: usize,
) {
    f.rows_range_mut(0..n_bus)
        .zip_apply(&mis.rows_range(0..n_bus), |a, b| *a = b.re);
    f.rows_range_mut(n_bus..num_state)
        .zip_apply(&mis.rows_range(npv..n_bus), |a, b| *a = b.im);
}

#[inline(always)]
fn update_v(
    v_a: &mut DVector<f64>,
    dx: &DVector<f64>,
    n_bus: usize,
    v_m: &mut DVector<f64>,
    npv: usize,
    num_state: usize,
    v: &mut DVector<Complex64>,
) {
    v_a.rows_range_mut(0..n_bus)
        .zip_apply(&dx.rows_range(0..n_bus), |a, b| {
            *a -= b;
            *a = a.rem_euclid(2.0 * PI);
        });
    v_m.rows_range_mut(npv..n_bus)
        .zip_apply(&dx.rows_range(n_bus..num_state), |a, b| *a -= b);

    v.iter_mut()
        .zip(v_m.iter().zip(v_a.iter()))
        .for_each(|(e, (&vm, &va))| *e = Complex64::from_polar(vm, va));
}

/// Assembles the real Jacobian
///
/// ```text
/// | dP/dVa  dP/dVm(pq) |
/// | dQ/dVa  dQ/dVm(pq) |   (Q rows for pq buses only)
/// ```
///
/// directly from the complex derivatives, skipping the slack rows and columns.
#[inline(always)]
fn build_jacobian(
    ds_dvm: &CscMatrix<Complex64>,
    ds_dva: &CscMatrix<Complex64>,
    npv: usize,
    n_bus: usize,
) -> CscMatrix<f64> {
    let num_state = n_bus + (n_bus - npv);
    let mut j = CooMatrix::new(num_state, num_state);
    // Angle columns for every non-slack bus.
    for (row, col, val) in ds_dva.triplet_iter() {
        if row >= n_bus || col >= n_bus {
            continue;
        }
        j.push(row, col, val.re);
        if row >= npv {
            j.push(n_bus + row - npv, col, val.im);
        }
    }
    // Magnitude columns for pq buses.
    for (row, col, val) in ds_dvm.triplet_iter() {
        if row >= n_bus || col < npv || col >= n_bus {
            continue;
        }
        let c = n_bus + col - npv;
        j.push(row, c, val.re);
        if row >= npv {
            j.push(n_bus + row - npv, c, val.im);
        }
    }
    CscMatrix::from(&j)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::solver::DefaultSolver;

    /// pv(0), pq(1), slack(2) on a small meshed system.
    fn three_bus() -> CscMatrix<Complex64> {
        let y01 = Complex64::new(2.0, -8.0);
        let y02 = Complex64::new(1.5, -6.0);
        let y12 = Complex64::new(1.0, -5.0);
        let mut coo = CooMatrix::new(3, 3);
        coo.push(0, 0, y01 + y02);
        coo.push(1, 1, y01 + y12);
        coo.push(2, 2, y02 + y12);
        for (a, b, y) in [(0, 1, y01), (0, 2, y02), (1, 2, y12)] {
            coo.push(a, b, -y);
            coo.push(b, a, -y);
        }
        CscMatrix::from(&coo)
    }

    #[test]
    fn converges_and_satisfies_specified_injections() {
        let y = three_bus();
        let sbus = DVector::from_vec(vec![
            Complex64::new(0.4, 0.0),
            Complex64::new(-0.9, -0.3),
            Complex64::new(0.0, 0.0),
        ]);
        let v0 = DVector::from_vec(vec![
            Complex64::new(1.02, 0.0),
            Complex64::new(1.0, 0.0),
            Complex64::new(1.0, 0.0),
        ]);
        let mut solver = DefaultSolver::default();
        let (v, it) = newton_pf(&y, &sbus, &v0, 1, 1, Some(1e-10), Some(20), &mut solver).unwrap();
        assert!(it > 0 && it < 10);
        let s = v.component_mul(&(&y * &v).conjugate());
        assert!((s[0].re - 0.4).abs() < 1e-9);
        assert!((s[1] - sbus[1]).norm() < 1e-9);
        assert!((v[0].norm() - 1.02).abs() < 1e-12);
        assert!((v[2] - Complex64::new(1.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn only_pv_buses_need_no_q_rows() {
        let y = three_bus();
        let sbus = DVector::from_vec(vec![
            Complex64::new(0.3, 0.0),
            Complex64::new(-0.2, 0.0),
            Complex64::new(0.0, 0.0),
        ]);
        let v0 = DVector::from_element(3, Complex64::new(1.0, 0.0));
        let mut solver = DefaultSolver::default();
        let (v, _) = newton_pf(&y, &sbus, &v0, 2, 0, None, None, &mut solver).unwrap();
        let s = v.component_mul(&(&y * &v).conjugate());
        assert!((s[0].re - 0.3).abs() < 1e-8);
        assert!((s[1].re + 0.2).abs() < 1e-8);
    }

    #[test]
    fn slack_only_system_returns_initial_voltage() {
        let y = three_bus();
        let sbus = DVector::zeros(3);
        let v0 = DVector::from_element(3, Complex64::new(1.0, 0.0));
        let mut solver = DefaultSolver::default();
        let (v, it) = newton_pf(&y, &sbus, &v0, 0, 0, None, None, &mut solver).unwrap();
        assert_eq!(it, 0);
        assert_eq!(v, v0);
    }

    #[test]
    fn reports_non_convergence() {
        let y = three_bus();
        let sbus = DVector::from_vec(vec![
            Complex64::new(0.0, 0.0),
            Complex64::new(-40.0, -30.0),
            Complex64::new(0.0, 0.0),
        ]);
        let v0 = DVector::from_element(3, Complex64::new(1.0, 0.0));
        let mut solver = DefaultSolver::default();
        let err = newton_pf(&y, &sbus, &v0, 1, 1, None, Some(8), &mut solver).unwrap_err();
        assert!(matches!(
            err,
            PowerFlowError::NotConverged { .. } | PowerFlowError::LinearSolve(_)
        ));
    }
}
