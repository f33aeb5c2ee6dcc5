use nalgebra::base::constraint::{
    SameNumberOfColumns, SameNumberOfRows, ShapeConstraint,
};
use nalgebra::base::storage::Storage;
use nalgebra::{Dim, Matrix};

/// Squared Euclidean distance between two rows after dividing each
/// coordinate by `scale`
#[inline]
pub(crate) fn scaled_sqdist<R1, C1, S1, R2, C2, S2>(
    a: &Matrix<f64, R1, C1, S1>,
    b: &Matrix<f64, R2, C2, S2>,
    scale: f64,
) -> f64
where
    R1: Dim,
    C1: Dim,
    S1: Storage<f64, R1, C1>,
    R2: Dim,
    C2: Dim,
    S2: Storage<f64, R2, C2>,
    ShapeConstraint: SameNumberOfRows<R1, R2> + SameNumberOfColumns<C1, C2>,
{
    a.zip_fold(b, 0.0_f64, |acc, x, y| {
        let d = (x - y) / scale;
        d.mul_add(d, acc)
    })
}
