use crate::basic::sparse::conj::Conjugate;
use nalgebra::{Complex, DVector};
use nalgebra_sparse::CscMatrix;

/// Builds a sparse diagonal matrix from a dense vector.
fn diag(v: &DVector<Complex<f64>>) -> CscMatrix<Complex<f64>> {
    let mut d = CscMatrix::identity(v.len());
    d.values_mut().copy_from_slice(v.as_slice());
    d
}

/// Partial derivatives of the complex bus power injections with respect to voltage
/// magnitude and angle, in polar form.
///
/// Returns `(dS_dVm, dS_dVa)`, both square with the dimension of `Ybus`.
///
/// The formulation follows MATPOWER:
///  R. D. Zimmerman, "AC Power Flows, Generalized OPF Costs and
///  their Derivatives using Complex Matrix Notation", MATPOWER
///  Technical Note 2, February 2010.
#[allow(non_snake_case)]
pub fn dSbus_dV(
    Ybus: &CscMatrix<Complex<f64>>,
    v: &DVector<Complex<f64>>,
) -> (CscMatrix<Complex<f64>>, CscMatrix<Complex<f64>>) {
    let ibus = Ybus * v;
    let v_norm = v.map(|e| if e.norm() > 0.0 { e / e.norm() } else { Complex::new(1.0, 0.0) });
    let diag_v = diag(v);
    let diag_vnorm = diag(&v_norm);
    let diag_ibus = diag(&ibus);

    let dS_dVm = &diag_v * (Ybus * &diag_vnorm).conjugate() + diag_ibus.conjugate() * &diag_vnorm;
    let dS_dVa = &diag_v * (diag_ibus - Ybus * &diag_v).conjugate() * Complex::<f64>::i();
    (dS_dVm, dS_dVa)
}
