//! Strassen's recursive multiplication.

use crate::ops::{self, add, subtract};
use crate::{CancelFlag, Error, Matrix, Scheduler};

/// Side length at or below which the direct product is used.
pub const DEFAULT_THRESHOLD: usize = 64;

/// A request to compute `a × b`.
///
/// The task only describes the work. [`MultiplyTask::decompose`] and
/// [`MultiplyTask::recombine`] hold Strassen's formulas; running the children
/// is left to whichever [`Scheduler`] the engine is given.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultiplyTask {
    pub a: Matrix,
    pub b: Matrix,
}

impl MultiplyTask {
    pub fn new(a: Matrix, b: Matrix) -> Self {
        Self { a, b }
    }

    pub fn size(&self) -> usize {
        self.a.size()
    }

    /// Checks that both operands have the same power-of-two size.
    pub fn validate(&self) -> Result<(), Error> {
        if self.a.size() != self.b.size() {
            return Err(Error::ShapeMismatch {
                left: self.a.size(),
                right: self.b.size(),
            });
        }
        self.a.ensure_power_of_two()
    }

    /// Builds the seven half-sized products M1..M7.
    pub fn decompose(&self) -> [MultiplyTask; 7] {
        let [a11, a12, a21, a22] = ops::quadrants(&self.a);
        let [b11, b12, b21, b22] = ops::quadrants(&self.b);
        [
            Self::new(add(&a11, &a22), add(&b11, &b22)),
            Self::new(add(&a21, &a22), b11.clone()),
            Self::new(a11.clone(), subtract(&b12, &b22)),
            Self::new(a22.clone(), subtract(&b21, &b11)),
            Self::new(add(&a11, &a12), b22.clone()),
            Self::new(subtract(&a21, &a11), add(&b11, &b12)),
            Self::new(subtract(&a12, &a22), add(&b21, &b22)),
        ]
    }

    /// Combines M1..M7 into the full product.
    pub fn recombine([m1, m2, m3, m4, m5, m6, m7]: [Matrix; 7]) -> Matrix {
        let c11 = add(&subtract(&add(&m1, &m4), &m5), &m7);
        let c12 = add(&m3, &m5);
        let c21 = add(&m2, &m4);
        let c22 = add(&subtract(&add(&m1, &m3), &m2), &m6);
        ops::assemble([c11, c12, c21, c22])
    }
}

/// Recursive Strassen multiplier.
///
/// The engine is a plain value; the same instance can drive any number of
/// concurrent multiplications on any scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StrassenEngine {
    threshold: usize,
}

impl StrassenEngine {
    /// Creates an engine that stops recursing at `threshold` (at least 1).
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold: threshold.max(1),
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Validates the operands and computes `a × b`.
    ///
    /// The operands are consumed; they become the root task.
    pub fn multiply<S: Scheduler>(
        &self,
        scheduler: &S,
        a: Matrix,
        b: Matrix,
        cancel: &CancelFlag,
    ) -> Result<Matrix, Error> {
        let task = MultiplyTask::new(a, b);
        task.validate()?;
        self.run(scheduler, task, cancel)
    }

    /// Executes an already validated task.
    ///
    /// The seven children are handed to `scheduler` as one batch and all of
    /// them complete before any quadrant of the result is formed.
    pub fn run<S: Scheduler>(
        &self,
        scheduler: &S,
        task: MultiplyTask,
        cancel: &CancelFlag,
    ) -> Result<Matrix, Error> {
        cancel.check()?;
        if task.size() <= self.threshold {
            return Ok(Matrix::naive_multiply(&task.a, &task.b));
        }

        let children = Vec::from(task.decompose());
        drop(task);
        let products =
            scheduler.invoke_all(children, |child| self.run(scheduler, child, cancel))?;

        let Ok(products) = <[Matrix; 7]>::try_from(products) else {
            unreachable!("invoke_all must return one product per child");
        };
        Ok(MultiplyTask::recombine(products))
    }
}

impl Default for StrassenEngine {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SequentialScheduler, WorkStealingScheduler};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random(size: usize, rng: &mut StdRng) -> Matrix {
        let values = (0..size * size).map(|_| rng.gen_range(-50..50)).collect();
        Matrix::from_vec(size, values).unwrap()
    }

    #[test]
    fn two_by_two_example() {
        let a = Matrix::from_rows(vec![vec![1, 2], vec![3, 4]]).unwrap();
        let b = Matrix::from_rows(vec![vec![5, 6], vec![7, 8]]).unwrap();
        let c = StrassenEngine::new(1)
            .multiply(&SequentialScheduler, a, b, &CancelFlag::new())
            .unwrap();
        assert_eq!(c.to_rows(), vec![vec![19, 22], vec![43, 50]]);
    }

    #[test]
    fn matches_direct_product_across_threshold() {
        let mut rng = StdRng::seed_from_u64(7);
        let pool = WorkStealingScheduler::new(4).unwrap();
        for size in [1, 2, 4, 8, 16, 64, 128] {
            let a = random(size, &mut rng);
            let b = random(size, &mut rng);
            let expected = Matrix::naive_multiply(&a, &b);
            for threshold in [1, 4, DEFAULT_THRESHOLD] {
                let engine = StrassenEngine::new(threshold);
                let got = engine.multiply(&pool, a.clone(), b.clone(), &CancelFlag::new()).unwrap();
                assert_eq!(got, expected, "size {size}, threshold {threshold}");
            }
        }
    }

    #[test]
    fn parallel_and_sequential_are_identical() {
        let mut rng = StdRng::seed_from_u64(42);
        let a = random(128, &mut rng);
        let b = random(128, &mut rng);
        let engine = StrassenEngine::new(8);
        let pool = WorkStealingScheduler::new(3).unwrap();

        let parallel = engine.multiply(&pool, a.clone(), b.clone(), &CancelFlag::new()).unwrap();
        let sequential = engine
            .multiply(&SequentialScheduler, a.clone(), b.clone(), &CancelFlag::new())
            .unwrap();
        assert_eq!(parallel.as_slice(), sequential.as_slice());
    }

    #[test]
    fn wraparound_matches_direct_product() {
        let a = Matrix::from_vec(4, vec![i32::MAX; 16]).unwrap();
        let b = Matrix::from_vec(4, vec![i32::MIN + 3; 16]).unwrap();
        let got = StrassenEngine::new(1)
            .multiply(&SequentialScheduler, a.clone(), b.clone(), &CancelFlag::new())
            .unwrap();
        assert_eq!(got, Matrix::naive_multiply(&a, &b));
    }

    #[test]
    fn decomposition_has_seven_half_sized_children() {
        let task = MultiplyTask::new(Matrix::identity(8), Matrix::identity(8));
        let children = task.decompose();
        assert_eq!(children.len(), 7);
        assert!(children.iter().all(|c| c.size() == 4 && c.validate().is_ok()));
    }

    #[test]
    fn rejects_bad_shapes() {
        let engine = StrassenEngine::default();
        let cancel = CancelFlag::new();

        let err = engine
            .multiply(&SequentialScheduler, Matrix::zeros(2), Matrix::zeros(4), &cancel)
            .unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { left: 2, right: 4 }));

        let err = engine
            .multiply(&SequentialScheduler, Matrix::zeros(6), Matrix::zeros(6), &cancel)
            .unwrap_err();
        assert!(matches!(err, Error::NotPowerOfTwo(6)));
    }

    #[test]
    fn cancelled_flag_aborts() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let pool = WorkStealingScheduler::new(2).unwrap();
        let err = StrassenEngine::new(2)
            .multiply(&pool, Matrix::identity(16), Matrix::identity(16), &cancel)
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[test]
    fn threshold_is_at_least_one() {
        assert_eq!(StrassenEngine::new(0).threshold(), 1);
        assert_eq!(StrassenEngine::default().threshold(), DEFAULT_THRESHOLD);
    }
}
