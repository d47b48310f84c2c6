mod rsparse;
pub use rsparse::*;

pub type DefaultSolver = RSparseSolver;

#[allow(non_snake_case)]
/// A trait for solving sparse linear systems.
pub trait Solve {
    /// Solves `A x = b` in place, `A` given in compressed sparse column form.
    ///
    /// # Parameters
    ///
    /// * `Ap` - Column pointers of the matrix.
    /// * `Ai` - Row indices of the matrix.
    /// * `Ax` - Non-zero values of the matrix.
    /// * `b` - Right-hand side vector, overwritten with the solution.
    /// * `n` - Dimension of the system.
    fn solve(
        &mut self,
        Ap: &mut [usize],
        Ai: &mut [usize],
        Ax: &mut [f64],
        b: &mut [f64],
        n: usize,
    ) -> Result<(), &'static str>;

    /// Forgets any symbolic analysis, required when the sparsity pattern changes.
    fn reset(&mut self);
}
