//! TCP listeners and top-level server wiring.
//!
//! This module:
//! - Binds the dynalogin listener, and the weblogin listener when a
//!   security-context factory is available.
//! - Caps concurrent sessions across both listeners with one semaphore;
//!   a permit is taken *before* accepting, so excess clients wait in the
//!   kernel backlog.
//! - Spawns one task per connection into a `JoinSet` and logs any that
//!   panic.
//! - On shutdown stops accepting and gives in-flight sessions a bounded
//!   grace period before aborting them.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tokio::time::{sleep, timeout};
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info, info_span, warn, Instrument};

use oath_core::Validator;

use crate::config::Config;
use crate::dynalogin;
use crate::security::ContextFactory;
use crate::types::{next_connection_id, Frontend};
use crate::weblogin;

/// Pause after a failed accept so a persistent error (e.g. EMFILE) does
/// not spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Everything a session needs besides its stream.
#[derive(Clone)]
pub struct Services {
    pub validator: Arc<Validator>,
    /// `None` serves dynalogin in plaintext.
    pub tls: Option<TlsAcceptor>,
    /// `None` disables the weblogin listener.
    pub contexts: Option<Arc<dyn ContextFactory>>,
}

/// Bound listening sockets.
pub struct Listeners {
    pub dynalogin: TcpListener,
    pub weblogin: Option<TcpListener>,
}

impl Listeners {
    /// Bind the addresses from `config`; weblogin only if `with_weblogin`.
    pub async fn bind(config: &Config, with_weblogin: bool) -> anyhow::Result<Self> {
        let dynalogin = TcpListener::bind(config.dynalogin_addr)
            .await
            .with_context(|| format!("failed to bind dynalogin on {}", config.dynalogin_addr))?;

        let weblogin = if with_weblogin {
            let listener = TcpListener::bind(config.weblogin_addr)
                .await
                .with_context(|| format!("failed to bind weblogin on {}", config.weblogin_addr))?;
            Some(listener)
        } else {
            None
        };

        Ok(Listeners {
            dynalogin,
            weblogin,
        })
    }
}

/// Bind according to `config` and serve until `shutdown` resolves.
pub async fn run<F>(config: &Config, services: Services, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()>,
{
    let listeners = Listeners::bind(config, services.contexts.is_some()).await?;

    info!(
        addr = %listeners.dynalogin.local_addr()?,
        tls = services.tls.is_some(),
        "dynalogin listening"
    );
    match &listeners.weblogin {
        Some(listener) => info!(addr = %listener.local_addr()?, "weblogin listening"),
        None => info!("weblogin disabled: no security context factory"),
    }

    serve(listeners, config, services, shutdown).await;
    Ok(())
}

struct Accepted {
    permit: OwnedSemaphorePermit,
    stream: TcpStream,
    peer: SocketAddr,
    frontend: Frontend,
}

/// Serve already-bound listeners until `shutdown` resolves, then drain.
///
/// Only `max_clients` and `shutdown_timeout` are taken from `config`.
pub async fn serve<F>(listeners: Listeners, config: &Config, services: Services, shutdown: F)
where
    F: Future<Output = ()>,
{
    let permits = Arc::new(Semaphore::new(config.max_clients));
    let mut sessions: JoinSet<()> = JoinSet::new();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            Some(res) = sessions.join_next() => log_session_exit(res),
            accepted = accept_next(&listeners, &permits) => match accepted {
                Ok(accepted) => spawn_session(&mut sessions, accepted, &services),
                Err(e) => back_off_after_accept_error(&e).await,
            },
        }
    }

    drop(listeners);
    info!(active = sessions.len(), "shutting down; draining sessions");

    let drained = timeout(config.shutdown_timeout, async {
        while let Some(res) = sessions.join_next().await {
            log_session_exit(res);
        }
    })
    .await
    .is_ok();

    if !drained {
        warn!(remaining = sessions.len(), "grace period expired; aborting sessions");
        sessions.shutdown().await;
    }
    info!("shutdown complete");
}

async fn accept_next(listeners: &Listeners, permits: &Arc<Semaphore>) -> io::Result<Accepted> {
    let permit = permits
        .clone()
        .acquire_owned()
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    let weblogin = async {
        match &listeners.weblogin {
            Some(listener) => listener.accept().await,
            None => std::future::pending().await,
        }
    };

    let ((stream, peer), frontend) = tokio::select! {
        res = listeners.dynalogin.accept() => (res?, Frontend::Dynalogin),
        res = weblogin => (res?, Frontend::Weblogin),
    };

    Ok(Accepted {
        permit,
        stream,
        peer,
        frontend,
    })
}

async fn back_off_after_accept_error(e: &io::Error) {
    warn!(error = %e, "accept failed");
    sleep(ACCEPT_BACKOFF).await;
}

fn spawn_session(sessions: &mut JoinSet<()>, accepted: Accepted, services: &Services) {
    let Accepted {
        permit,
        stream,
        peer,
        frontend,
    } = accepted;
    let conn = next_connection_id();
    let services = services.clone();
    debug!(%frontend, %conn, %peer, "connection accepted");

    match frontend {
        Frontend::Dynalogin => {
            let span = info_span!("dynalogin", %conn, %peer);
            sessions.spawn(
                async move {
                    run_dynalogin(stream, services).await;
                    drop(permit);
                }
                .instrument(span),
            );
        }
        Frontend::Weblogin => {
            let span = info_span!("weblogin", %conn, %peer);
            sessions.spawn(
                async move {
                    run_weblogin(stream, services).await;
                    drop(permit);
                }
                .instrument(span),
            );
        }
    }
}

async fn run_dynalogin(stream: TcpStream, services: Services) {
    let Some(acceptor) = services.tls else {
        dynalogin::serve(stream, services.validator).await;
        return;
    };

    let tls = match timeout(dynalogin::IDLE_TIMEOUT, acceptor.accept(stream)).await {
        Ok(Ok(tls)) => tls,
        Ok(Err(e)) => {
            warn!(error = %e, "TLS handshake failed");
            return;
        }
        Err(_) => {
            warn!("TLS handshake timed out");
            return;
        }
    };

    let (_, conn) = tls.get_ref();
    debug!(
        protocol = ?conn.protocol_version(),
        cipher = ?conn.negotiated_cipher_suite().map(|s| s.suite()),
        "TLS established"
    );

    dynalogin::serve(tls, services.validator).await;
}

async fn run_weblogin(stream: TcpStream, services: Services) {
    let Some(factory) = services.contexts else {
        error!("weblogin connection accepted without a context factory");
        return;
    };

    let context = match factory.new_context() {
        Ok(context) => context,
        Err(e) => {
            warn!(error = %e, "unable to create security context");
            return;
        }
    };

    // Already logged by the session.
    let _ = weblogin::serve(stream, context).await;
}

fn log_session_exit(res: Result<(), JoinError>) {
    match res {
        Ok(()) => {}
        Err(e) if e.is_panic() => error!(error = %e, "session panicked"),
        Err(e) => debug!(error = %e, "session cancelled"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn accept_errors_are_followed_by_a_pause() {
        let start = tokio::time::Instant::now();
        let err = io::Error::new(io::ErrorKind::Other, "too many open files");
        back_off_after_accept_error(&err).await;
        assert!(start.elapsed() >= ACCEPT_BACKOFF);
    }
}
