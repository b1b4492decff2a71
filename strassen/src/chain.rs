//! Left-to-right reduction of a matrix sequence.

use std::sync::Arc;

use crate::{CancelFlag, Error, Matrix, MultiplyTask, Scheduler, StrassenEngine};

/// Reduces `[M0, M1, ..., Mk]` to `((M0 × M1) × ...) × Mk`.
///
/// Each step is submitted to the scheduler as one root task and joined
/// before the next starts, since every step consumes the previous result.
/// Only the Strassen sub-products inside a step run in parallel.
pub struct ChainMultiplier<S> {
    engine: StrassenEngine,
    scheduler: Arc<S>,
}

impl<S: Scheduler + 'static> ChainMultiplier<S> {
    pub fn new(engine: StrassenEngine, scheduler: Arc<S>) -> Self {
        Self { engine, scheduler }
    }

    pub fn engine(&self) -> StrassenEngine {
        self.engine
    }

    pub fn scheduler(&self) -> &Arc<S> {
        &self.scheduler
    }

    /// Multiplies the sequence left to right.
    ///
    /// A single matrix is returned unchanged. Sizes are checked up front, so
    /// a mismatch anywhere in the chain fails before any work is scheduled.
    pub fn reduce(&self, sequence: Vec<Matrix>, cancel: &CancelFlag) -> Result<Matrix, Error> {
        validate(&sequence)?;

        let mut matrices = sequence.into_iter();
        let Some(mut acc) = matrices.next() else {
            return Err(Error::EmptySequence);
        };

        for (step, next) in matrices.enumerate() {
            cancel.check()?;
            tracing::trace!(step, size = acc.size(), "submitting chain step");

            let task = MultiplyTask::new(acc, next);
            let engine = self.engine;
            let scheduler = Arc::clone(&self.scheduler);
            let step_cancel = cancel.clone();
            let handle = self
                .scheduler
                .submit(move || engine.run(&*scheduler, task, &step_cancel));
            acc = self.scheduler.join(handle)?;
        }

        Ok(acc)
    }
}

/// Checks the shape rules of a chain without computing anything.
///
/// The sequence must be non-empty; when it has more than one matrix, all
/// of them must share one power-of-two size.
pub fn validate(sequence: &[Matrix]) -> Result<(), Error> {
    let first = sequence.first().ok_or(Error::EmptySequence)?;
    if sequence.len() == 1 {
        return Ok(());
    }
    for pair in sequence.windows(2) {
        if pair[0].size() != pair[1].size() {
            return Err(Error::ShapeMismatch {
                left: pair[0].size(),
                right: pair[1].size(),
            });
        }
    }
    first.ensure_power_of_two()
}

/// Reference reduction with the direct product on the calling thread.
pub fn reduce_naive(sequence: &[Matrix]) -> Result<Matrix, Error> {
    validate(sequence)?;
    let (first, rest) = sequence.split_first().ok_or(Error::EmptySequence)?;
    Ok(rest
        .iter()
        .fold(first.clone(), |acc, next| Matrix::naive_multiply(&acc, next)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SequentialScheduler, TaskHandle, WorkStealingScheduler};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn random(size: usize, rng: &mut StdRng) -> Matrix {
        let values = (0..size * size).map(|_| rng.gen_range(0..10)).collect();
        Matrix::from_vec(size, values).unwrap()
    }

    fn chain(threshold: usize) -> ChainMultiplier<WorkStealingScheduler> {
        let pool = Arc::new(WorkStealingScheduler::new(2).unwrap());
        ChainMultiplier::new(StrassenEngine::new(threshold), pool)
    }

    /// Counts root submissions and delegates everything to the inner scheduler.
    #[derive(Default)]
    struct Counting {
        inner: SequentialScheduler,
        submitted: AtomicUsize,
    }

    impl Scheduler for Counting {
        fn submit<T, F>(&self, task: F) -> TaskHandle<T>
        where
            F: FnOnce() -> Result<T, Error> + Send + 'static,
            T: Send + 'static,
        {
            self.submitted.fetch_add(1, Ordering::SeqCst);
            self.inner.submit(task)
        }

        fn join<T>(&self, handle: TaskHandle<T>) -> Result<T, Error> {
            self.inner.join(handle)
        }

        fn invoke_all<I, T, F>(&self, inputs: Vec<I>, f: F) -> Result<Vec<T>, Error>
        where
            I: Send,
            T: Send,
            F: Fn(I) -> Result<T, Error> + Send + Sync,
        {
            self.inner.invoke_all(inputs, f)
        }

        fn parallelism(&self) -> usize {
            1
        }
    }

    #[test]
    fn single_matrix_is_returned_unchanged() {
        let mut rng = StdRng::seed_from_u64(1);
        let a = random(8, &mut rng);
        let out = chain(2).reduce(vec![a.clone()], &CancelFlag::new()).unwrap();
        assert_eq!(out, a);
    }

    #[test]
    fn chains_left_to_right() {
        let mut rng = StdRng::seed_from_u64(2);
        let (a, b, c) = (random(16, &mut rng), random(16, &mut rng), random(16, &mut rng));
        let expected = Matrix::naive_multiply(&Matrix::naive_multiply(&a, &b), &c);

        let out = chain(4)
            .reduce(vec![a.clone(), b.clone(), c.clone()], &CancelFlag::new())
            .unwrap();
        assert_eq!(out, expected);
        assert_eq!(reduce_naive(&[a, b, c]).unwrap(), expected);
    }

    #[test]
    fn performs_one_step_per_pair() {
        let mut rng = StdRng::seed_from_u64(3);
        let counting = Arc::new(Counting::default());
        let multiplier = ChainMultiplier::new(StrassenEngine::new(2), Arc::clone(&counting));

        let sequence: Vec<_> = (0..5).map(|_| random(4, &mut rng)).collect();
        multiplier.reduce(sequence, &CancelFlag::new()).unwrap();
        assert_eq!(counting.submitted.load(Ordering::SeqCst), 4);

        multiplier
            .reduce(vec![random(4, &mut rng)], &CancelFlag::new())
            .unwrap();
        assert_eq!(counting.submitted.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn rejects_empty_and_mismatched_sequences() {
        let multiplier = chain(2);
        let cancel = CancelFlag::new();

        assert!(matches!(
            multiplier.reduce(Vec::new(), &cancel),
            Err(Error::EmptySequence)
        ));

        let err = multiplier
            .reduce(vec![Matrix::zeros(4), Matrix::zeros(4), Matrix::zeros(8)], &cancel)
            .unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { left: 4, right: 8 }));

        let err = multiplier
            .reduce(vec![Matrix::zeros(3), Matrix::zeros(3)], &cancel)
            .unwrap_err();
        assert!(matches!(err, Error::NotPowerOfTwo(3)));
    }

    #[test]
    fn cancellation_stops_the_chain() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let err = chain(2)
            .reduce(vec![Matrix::identity(4), Matrix::identity(4)], &cancel)
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[test]
    fn cancelling_one_chain_leaves_others_on_the_pool_intact() {
        let pool = Arc::new(WorkStealingScheduler::new(2).unwrap());
        let slow = Arc::new(ChainMultiplier::new(StrassenEngine::new(2), Arc::clone(&pool)));
        let fast = ChainMultiplier::new(StrassenEngine::new(8), pool);

        let cancel = CancelFlag::new();
        let slow_cancel = cancel.clone();
        let victim = std::thread::spawn(move || {
            slow.reduce(vec![Matrix::identity(128); 20], &slow_cancel)
        });

        let mut rng = StdRng::seed_from_u64(5);
        let sequence: Vec<_> = (0..3).map(|_| random(64, &mut rng)).collect();
        let expected = reduce_naive(&sequence).unwrap();

        std::thread::sleep(std::time::Duration::from_millis(20));
        cancel.cancel();
        let survivor = fast.reduce(sequence, &CancelFlag::new()).unwrap();

        assert!(matches!(victim.join().unwrap(), Err(Error::Cancelled)));
        assert_eq!(survivor, expected);
    }
}
