//! Serves one client session.

use std::sync::Arc;
use std::time::{Duration, Instant};

use strassen::{CancelFlag, ChainMultiplier, Matrix, Scheduler};
use strassen_types::{MultiplyRequest, MultiplyResponse, read_frame, write_frame};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::session::{Session, SessionState};
use crate::Error;

/// Receives a matrix chain, multiplies it and sends back the product.
///
/// Any failure closes the connection without a response. The handler never
/// panics on bad input, so one broken client cannot take down the acceptor
/// or other sessions.
pub struct ConnectionHandler<S> {
    chain: Arc<ChainMultiplier<S>>,
    max_frame_bytes: usize,
    compute_timeout: Option<Duration>,
    verify_sequential: bool,
    shutdown: watch::Receiver<bool>,
}

impl<S> Clone for ConnectionHandler<S> {
    fn clone(&self) -> Self {
        Self {
            chain: Arc::clone(&self.chain),
            max_frame_bytes: self.max_frame_bytes,
            compute_timeout: self.compute_timeout,
            verify_sequential: self.verify_sequential,
            shutdown: self.shutdown.clone(),
        }
    }
}

impl<S: Scheduler + 'static> ConnectionHandler<S> {
    pub fn new(
        chain: Arc<ChainMultiplier<S>>,
        max_frame_bytes: usize,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            chain,
            max_frame_bytes,
            compute_timeout: None,
            verify_sequential: false,
            shutdown,
        }
    }

    pub fn with_compute_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.compute_timeout = timeout;
        self
    }

    pub fn with_verify_sequential(mut self, verify: bool) -> Self {
        self.verify_sequential = verify;
        self
    }

    /// Drives `session` to [`SessionState::Closed`] over `stream`.
    pub async fn handle<IO>(&self, mut stream: IO, mut session: Session) -> Result<(), Error>
    where
        IO: AsyncRead + AsyncWrite + Unpin,
    {
        let outcome = self.serve(&mut stream, &mut session).await;
        match &outcome {
            Ok(()) => info!(elapsed_ms = session.elapsed_ms() as u64, "session completed"),
            Err(e) => {
                session.advance(SessionState::Failed);
                warn!(error = %e, elapsed_ms = session.elapsed_ms() as u64, "session failed");
            }
        }

        if let Err(e) = stream.shutdown().await {
            debug!(error = %e, "error closing connection");
        }
        session.advance(SessionState::Closed);
        outcome
    }

    async fn serve<IO>(&self, stream: &mut IO, session: &mut Session) -> Result<(), Error>
    where
        IO: AsyncRead + AsyncWrite + Unpin,
    {
        let mut shutdown = self.shutdown.clone();
        let request: MultiplyRequest = tokio::select! {
            // Input that has fully arrived is taken before shutdown is checked.
            biased;
            frame = read_frame(stream, self.max_frame_bytes) => frame?,
            _ = shutdown_requested(&mut shutdown) => return Err(Error::ShuttingDown),
        };
        let matrices = request.into_matrices()?;
        strassen::chain::validate(&matrices)?;
        info!(
            count = matrices.len(),
            size = matrices.first().map_or(0, Matrix::size),
            "received matrices"
        );

        session.advance(SessionState::Computing);
        let product = self.compute(matrices, session.cancel_flag().clone()).await?;

        session.advance(SessionState::SendingResult);
        write_frame(stream, &MultiplyResponse::from_matrix(product)).await?;
        Ok(())
    }

    /// Runs the chain off the async runtime, cancelling it on shutdown or
    /// timeout and waiting until it has released the pool.
    async fn compute(&self, matrices: Vec<Matrix>, cancel: CancelFlag) -> Result<Matrix, Error> {
        let chain = Arc::clone(&self.chain);
        let verify = self.verify_sequential;
        let job_cancel = cancel.clone();
        let mut job = tokio::task::spawn_blocking(move || {
            let baseline = verify.then(|| matrices.clone());
            let started = Instant::now();
            let product = chain.reduce(matrices, &job_cancel)?;
            if let Some(baseline) = baseline {
                verify_against_baseline(&chain, &baseline, &product, started.elapsed());
            }
            Ok::<_, strassen::Error>(product)
        });

        let mut shutdown = self.shutdown.clone();
        let deadline = self.compute_timeout;

        tokio::select! {
            joined = &mut job => Ok(joined??),
            _ = shutdown_requested(&mut shutdown) => {
                debug!("cancelling computation for shutdown");
                cancel.cancel();
                Ok(job.await??)
            }
            _ = sleep_or_forever(deadline) => {
                cancel.cancel();
                // Let the job observe the flag before reporting.
                if let Err(e) = job.await {
                    debug!(error = %e, "timed out computation did not finish cleanly");
                }
                Err(Error::TimedOut(deadline.unwrap_or_default()))
            }
        }
    }
}

async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    let stopped = rx.wait_for(|stop| *stop).await.is_ok();
    if !stopped {
        // Sender gone without a shutdown: never fire.
        std::future::pending::<()>().await;
    }
}

async fn sleep_or_forever(timeout: Option<Duration>) {
    match timeout {
        Some(timeout) => tokio::time::sleep(timeout).await,
        None => std::future::pending().await,
    }
}

/// Recomputes the chain with the direct product and logs the speedup.
fn verify_against_baseline<S: Scheduler + 'static>(
    chain: &ChainMultiplier<S>,
    baseline: &[Matrix],
    product: &Matrix,
    parallel: Duration,
) {
    let started = Instant::now();
    let expected = match strassen::chain::reduce_naive(baseline) {
        Ok(expected) => expected,
        Err(e) => {
            error!(error = %e, "baseline computation failed");
            return;
        }
    };
    let serial = started.elapsed();

    let speedup = serial.as_secs_f64() / parallel.as_secs_f64().max(f64::EPSILON);
    let efficiency = speedup / chain.scheduler().parallelism() as f64;
    info!(
        parallel_ms = parallel.as_millis() as u64,
        serial_ms = serial.as_millis() as u64,
        speedup,
        efficiency,
        "sequential baseline"
    );
    if &expected != product {
        error!("parallel product differs from sequential baseline");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strassen::{SequentialScheduler, StrassenEngine, WorkStealingScheduler};
    use strassen_types::{DEFAULT_MAX_FRAME_BYTES, FrameError};
    use tokio::io::{AsyncReadExt, duplex};

    fn make_handler<S: Scheduler + 'static>(
        scheduler: S,
    ) -> (ConnectionHandler<S>, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(false);
        let chain = Arc::new(ChainMultiplier::new(StrassenEngine::new(2), Arc::new(scheduler)));
        (ConnectionHandler::new(chain, DEFAULT_MAX_FRAME_BYTES, rx), tx)
    }

    #[tokio::test]
    async fn answers_a_valid_request() {
        let (handler, _tx) = make_handler(SequentialScheduler);
        let (mut client, server) = duplex(1 << 16);

        let a = Matrix::from_rows(vec![vec![1, 2], vec![3, 4]]).unwrap();
        let b = Matrix::from_rows(vec![vec![5, 6], vec![7, 8]]).unwrap();
        write_frame(&mut client, &MultiplyRequest::from_matrices([&a, &b]))
            .await
            .unwrap();

        handler.handle(server, Session::new(1, None)).await.unwrap();

        let response: MultiplyResponse = read_frame(&mut client, DEFAULT_MAX_FRAME_BYTES)
            .await
            .unwrap();
        let product = Matrix::try_from(response.result.unwrap()).unwrap();
        assert_eq!(product.to_rows(), vec![vec![19, 22], vec![43, 50]]);
    }

    #[tokio::test]
    async fn empty_sequence_closes_without_response() {
        let (handler, _tx) = make_handler(SequentialScheduler);
        let (mut client, server) = duplex(1 << 16);
        write_frame(&mut client, &MultiplyRequest::default()).await.unwrap();

        let err = handler.handle(server, Session::new(2, None)).await.unwrap_err();
        assert!(matches!(err, Error::Compute(strassen::Error::EmptySequence)));

        let mut rest = Vec::new();
        client.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn short_input_fails_the_session() {
        let (handler, _tx) = make_handler(SequentialScheduler);
        let (mut client, server) = duplex(64);
        client.write_all(&100u32.to_be_bytes()).await.unwrap();
        drop(client);

        let err = handler.handle(server, Session::new(3, None)).await.unwrap_err();
        assert!(matches!(err, Error::Transport(FrameError::Io(_))));
    }

    #[tokio::test]
    async fn shutdown_cancels_a_running_computation() {
        let (handler, tx) = make_handler(WorkStealingScheduler::new(1).unwrap());
        let (mut client, server) = duplex(1 << 20);

        let big = Matrix::identity(128);
        let chain: Vec<&Matrix> = std::iter::repeat(&big).take(16).collect();
        write_frame(&mut client, &MultiplyRequest::from_matrices(chain))
            .await
            .unwrap();

        let session = tokio::spawn(async move { handler.handle(server, Session::new(4, None)).await });
        tx.send(true).unwrap();

        let err = session.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::Compute(strassen::Error::Cancelled)));
    }

    #[tokio::test]
    async fn shutdown_releases_an_idle_session() {
        let (handler, tx) = make_handler(SequentialScheduler);
        let (_client, server) = duplex(64);

        let session = tokio::spawn(async move { handler.handle(server, Session::new(6, None)).await });
        tx.send(true).unwrap();

        let err = tokio::time::timeout(Duration::from_secs(5), session)
            .await
            .expect("idle session ignored shutdown")
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, Error::ShuttingDown));
    }

    #[tokio::test]
    async fn timeout_cancels_a_running_computation() {
        let (handler, _tx) = make_handler(WorkStealingScheduler::new(1).unwrap());
        let handler = handler.with_compute_timeout(Some(Duration::from_millis(20)));
        let (mut client, server) = duplex(1 << 20);

        let big = Matrix::identity(128);
        let chain: Vec<&Matrix> = std::iter::repeat(&big).take(16).collect();
        write_frame(&mut client, &MultiplyRequest::from_matrices(chain))
            .await
            .unwrap();

        let err = handler.handle(server, Session::new(5, None)).await.unwrap_err();
        assert!(matches!(err, Error::TimedOut(_)));
    }
}
