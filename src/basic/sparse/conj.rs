use nalgebra::{Complex, SimdComplexField, SimdRealField};
use nalgebra_sparse::CscMatrix;

/// Trait for computing the conjugate of a matrix.
pub(crate) trait Conjugate {
    type Mat;

    /// Returns the conjugate of the matrix.
    fn conjugate(&self) -> Self::Mat;

    /// Computes the conjugate of the matrix in-place.
    fn conjugate_mut(&mut self);
}

impl<T: SimdRealField> Conjugate for CscMatrix<Complex<T>>
where
    Complex<T>: SimdComplexField,
{
    type Mat = CscMatrix<Complex<T>>;

    fn conjugate(&self) -> Self::Mat {
        let mut out = self.clone();
        out.conjugate_mut();
        out
    }

    fn conjugate_mut(&mut self) {
        self.values_mut()
            .iter_mut()
            .for_each(|v| *v = v.clone().simd_conjugate());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra_sparse::CooMatrix;

    fn sample(sign: f64) -> CscMatrix<Complex<f64>> {
        let mut a = CooMatrix::new(4, 4);
        a.push(0, 0, Complex::new(1.0, -sign));
        a.push(2, 1, Complex::new(3.0, sign));
        a.push(3, 3, Complex::new(5.0, -2.0 * sign));
        (&a).into()
    }

    #[test]
    fn conjugate_flips_imaginary_parts() {
        assert_eq!(sample(1.0).conjugate(), sample(-1.0));
    }

    #[test]
    fn conjugate_mut_keeps_pattern() {
        let mut a = sample(1.0);
        a.conjugate_mut();
        assert_eq!(a.pattern(), sample(-1.0).pattern());
        assert_eq!(a, sample(-1.0));
    }
}
