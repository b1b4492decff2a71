//! Accept loop and connection dispatch.

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use futures_util::stream::{Stream, StreamExt};
use strassen::{ChainMultiplier, Scheduler, StrassenEngine};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;
use tokio_stream::wrappers::TcpListenerStream;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::config::ServerConfig;
use crate::handler::ConnectionHandler;
use crate::session::Session;
use crate::Error;

/// Accepts clients and hands each one to a [`ConnectionHandler`].
///
/// Accepted connections wait for one of `connection_slots` handler slots
/// without holding up the accept loop. When more than
/// `max_queued_connections` are already waiting, new connections are closed
/// straight away.
pub struct Server<S> {
    handler: ConnectionHandler<S>,
    slots: Arc<Semaphore>,
    queued: Arc<AtomicUsize>,
    max_queued: usize,
    next_session: AtomicU64,
    shutdown: watch::Sender<bool>,
}

impl<S: Scheduler + 'static> Server<S> {
    /// Creates a server that computes on `scheduler`.
    pub fn new(config: &ServerConfig, scheduler: Arc<S>) -> Result<Self, Error> {
        config.validate()?;

        let chain = Arc::new(ChainMultiplier::new(
            StrassenEngine::new(config.threshold),
            scheduler,
        ));
        let (shutdown, shutdown_rx) = watch::channel(false);
        let handler = ConnectionHandler::new(chain, config.max_frame_bytes, shutdown_rx)
            .with_compute_timeout(config.compute_timeout())
            .with_verify_sequential(config.verify_sequential);

        Ok(Self {
            handler,
            slots: Arc::new(Semaphore::new(config.connection_slots)),
            queued: Arc::new(AtomicUsize::new(0)),
            max_queued: config.max_queued_connections,
            next_session: AtomicU64::new(1),
            shutdown,
        })
    }

    /// Serves `listener` until the process is stopped.
    pub async fn serve(self, listener: TcpListener) -> Result<(), Error> {
        self.serve_with_shutdown(listener, std::future::pending()).await
    }

    /// Serves `listener` until `signal` resolves.
    pub async fn serve_with_shutdown<F>(self, listener: TcpListener, signal: F) -> Result<(), Error>
    where
        F: Future<Output = ()>,
    {
        info!(addr = ?listener.local_addr()?, "server listening");
        self.serve_with_incoming_shutdown(TcpListenerStream::new(listener), signal)
            .await
    }

    /// Serves connections from `incoming` until it ends or `signal` resolves.
    ///
    /// On shutdown the accept loop stops, running computations are
    /// cancelled, and the call returns once every session has closed.
    pub async fn serve_with_incoming_shutdown<I, F>(self, incoming: I, signal: F) -> Result<(), Error>
    where
        I: Stream<Item = io::Result<TcpStream>>,
        F: Future<Output = ()>,
    {
        tokio::pin!(incoming);
        tokio::pin!(signal);
        let mut sessions = JoinSet::new();

        loop {
            tokio::select! {
                _ = &mut signal => {
                    info!("shutdown requested");
                    break;
                }
                conn = incoming.next() => match conn {
                    Some(Ok(stream)) => self.dispatch(&mut sessions, stream),
                    Some(Err(e)) => warn!(error = %e, "failed to accept connection"),
                    None => break,
                },
                Some(_) = sessions.join_next(), if !sessions.is_empty() => {}
            }
        }

        let _ = self.shutdown.send(true);
        let in_flight = sessions.len();
        if in_flight > 0 {
            info!(in_flight, "waiting for sessions to close");
        }
        while sessions.join_next().await.is_some() {}
        info!("server stopped");
        Ok(())
    }

    fn dispatch(&self, sessions: &mut JoinSet<()>, stream: TcpStream) {
        let peer = stream.peer_addr().ok();
        if self.queued.load(Ordering::SeqCst) >= self.max_queued {
            warn!(peer = ?peer, max_queued = self.max_queued, "connection queue full, dropping client");
            return;
        }
        self.queued.fetch_add(1, Ordering::SeqCst);

        let id = self.next_session.fetch_add(1, Ordering::SeqCst);
        let slots = Arc::clone(&self.slots);
        let queued = Arc::clone(&self.queued);
        let handler = self.handler.clone();
        let shutdown = self.shutdown.subscribe();
        let span = info_span!("session", id, peer = ?peer);

        sessions.spawn(
            async move {
                let permit = slots.acquire_owned().await;
                queued.fetch_sub(1, Ordering::SeqCst);
                let Ok(_permit) = permit else {
                    return;
                };
                let stopping = *shutdown.borrow();
                if stopping {
                    debug!("server shutting down, closing queued client");
                    return;
                }
                debug!("client connected");
                // Errors are logged by the handler; nothing propagates to the acceptor.
                let _ = handler.handle(stream, Session::new(id, peer)).await;
            }
            .instrument(span),
        );
    }
}
