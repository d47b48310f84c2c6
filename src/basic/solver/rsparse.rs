use rsparse::{
    data::{self, Symb},
    lsolve, lu, sqr, usolve,
};

use super::Solve;

/// Sparse LU solver backed by `rsparse`.
///
/// The symbolic analysis is computed on the first call and reused until [`Solve::reset`],
/// so one instance must only see matrices sharing a sparsity pattern.
#[derive(Default)]
pub struct RSparseSolver {
    x: Vec<f64>,
    symbolic: Option<Symb>,
}

#[allow(non_snake_case)]
impl Solve for RSparseSolver {
    fn solve(
        &mut self,
        Ap: &mut [usize],
        Ai: &mut [usize],
        Ax: &mut [f64],
        b: &mut [f64],
        n: usize,
    ) -> Result<(), &'static str> {
        if Ap.len() != n + 1 || b.len() != n {
            return Err("matrix and right-hand side dimensions do not match");
        }
        if n == 0 {
            return Ok(());
        }
        let p: Vec<isize> = Ap.iter().map(|&v| v as isize).collect();
        let a = data::Sprs {
            m: n,
            n,
            i: Ai.to_vec(),
            p,
            x: Ax.to_vec(),
            nzmax: Ax.len(),
        };
        if self.x.len() != n {
            self.symbolic = None;
            self.x = vec![0.0; n];
        }
        let s = self.symbolic.get_or_insert_with(|| sqr(&a, 1, false));
        let num = lu(&a, s, 1e-6).map_err(|_| "LU factorization failed")?;
        let x = &mut self.x;
        ipvec(&num.pinv, b, x); // x = P*b
        lsolve(&num.l, x); // x = L\x
        usolve(&num.u, x); // x = U\x
        ipvec(&s.q, x, b); // b = Q*x
        if b.iter().any(|v| !v.is_finite()) {
            return Err("singular matrix");
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.symbolic = None;
    }
}

fn ipvec(p: &Option<Vec<isize>>, b: &[f64], x: &mut [f64]) {
    match p {
        Some(pvec) => {
            for k in 0..b.len() {
                x[pvec[k] as usize] = b[k];
            }
        }
        None => x.copy_from_slice(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DMatrix;
    use nalgebra_sparse::{CooMatrix, CscMatrix};

    #[test]
    fn solves_small_unsymmetric_system() {
        let dense =
            DMatrix::from_row_slice(3, 3, &[4.0, -1.0, 0.0, -2.0, 5.0, -1.0, 0.0, -3.0, 6.0]);
        let mut coo = CooMatrix::new(3, 3);
        for ((i, j), v) in dense.iter().enumerate().map(|(k, v)| ((k % 3, k / 3), *v)) {
            if v != 0.0 {
                coo.push(i, j, v);
            }
        }
        let csc = CscMatrix::from(&coo);
        let (mut ap, mut ai, mut ax) = csc.disassemble();
        let expected = [1.0, 2.0, 3.0];
        let mut b: Vec<f64> = (0..3)
            .map(|i| (0..3).map(|j| dense[(i, j)] * expected[j]).sum())
            .collect();
        let mut solver = RSparseSolver::default();
        solver.solve(&mut ap, &mut ai, &mut ax, &mut b, 3).unwrap();
        for (x, e) in b.iter().zip(expected) {
            assert!((x - e).abs() < 1e-12, "{x} != {e}");
        }
    }

    #[test]
    fn reset_allows_a_new_sparsity_pattern() {
        let mut solver = RSparseSolver::default();
        let (mut ap, mut ai, mut ax) = (vec![0, 2, 4], vec![0, 1, 0, 1], vec![2.0, 1.0, 1.0, 3.0]);
        let mut b = vec![3.0, 4.0];
        solver.solve(&mut ap, &mut ai, &mut ax, &mut b, 2).unwrap();
        assert!((b[0] - 1.0).abs() < 1e-12 && (b[1] - 1.0).abs() < 1e-12);

        solver.reset();
        let (mut ap, mut ai, mut ax) = (vec![0, 1, 2], vec![0, 1], vec![4.0, 5.0]);
        let mut b = vec![2.0, 10.0];
        solver.solve(&mut ap, &mut ai, &mut ax, &mut b, 2).unwrap();
        assert_eq!(b, vec![0.5, 2.0]);
    }

    #[test]
    fn rejects_mismatched_dimensions() {
        let mut solver = RSparseSolver::default();
        let err = solver
            .solve(&mut [0, 0], &mut [], &mut [], &mut [1.0, 2.0], 1)
            .unwrap_err();
        assert!(err.contains("dimensions"));
    }
}
