// Connection handling module
// Accepts a single TCP connection and serves it with hyper

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::config::AppState;
use crate::handler;
use crate::logger;

/// Accept a connection, enforcing `performance.max_connections`.
pub fn accept_connection(
    stream: tokio::net::TcpStream,
    peer_addr: std::net::SocketAddr,
    state: &Arc<AppState>,
) {
    // Increment first, then check, so concurrent accepts cannot both slip under the limit
    let prev_count = state.active_connections.fetch_add(1, Ordering::SeqCst);

    if let Some(max_conn) = state.config.performance.max_connections {
        if prev_count >= usize::try_from(max_conn).unwrap_or(usize::MAX) {
            state.active_connections.fetch_sub(1, Ordering::SeqCst);
            logger::log_warning(&format!(
                "Max connections reached: {prev_count}/{max_conn}. Connection from {peer_addr} rejected."
            ));
            drop(stream);
            return;
        }
    }

    logger::log_connection_accepted(&peer_addr);
    handle_connection(stream, peer_addr, Arc::clone(state));
}

/// Serve one connection on its own task.
///
/// Request heads must arrive within `read_timeout`. Between requests the
/// connection is closed gracefully once it has been idle for
/// `keep_alive_timeout`. A request in flight is never cut short here; its
/// upstream call is bounded by the relay client instead.
fn handle_connection(
    stream: tokio::net::TcpStream,
    peer_addr: std::net::SocketAddr,
    state: Arc<AppState>,
) {
    tokio::spawn(async move {
        let io = TokioIo::new(stream);

        let performance = &state.config.performance;
        let idle_timeout = Duration::from_secs(performance.keep_alive_timeout);

        let mut builder = http1::Builder::new();
        builder
            .timer(TokioTimer::new())
            .header_read_timeout(Duration::from_secs(performance.read_timeout))
            .keep_alive(!idle_timeout.is_zero());

        let activity = Arc::new(Activity::new());
        let service_activity = Arc::clone(&activity);
        let service_state = Arc::clone(&state);
        let conn = builder.serve_connection(
            io,
            service_fn(move |req| {
                let in_flight = service_activity.begin();
                let state = Arc::clone(&service_state);
                async move {
                    let response = handler::handle_request(req, peer_addr, state).await;
                    drop(in_flight);
                    response
                }
            }),
        );
        tokio::pin!(conn);

        let mut closing = false;
        let result = loop {
            let wait = activity
                .idle_for()
                .map_or(idle_timeout, |idle| idle_timeout.saturating_sub(idle));

            tokio::select! {
                result = conn.as_mut() => break result,
                () = tokio::time::sleep(wait), if !closing && !idle_timeout.is_zero() => {
                    if activity.idle_for().is_some_and(|idle| idle >= idle_timeout) {
                        logger::log_debug(&format!(
                            "[Connection] Closing idle keep-alive connection from {peer_addr}"
                        ));
                        conn.as_mut().graceful_shutdown();
                        closing = true;
                    }
                }
            }
        };

        if let Err(err) = result {
            logger::log_connection_error(&err);
        }

        state.active_connections.fetch_sub(1, Ordering::SeqCst);
    });
}

/// Tracks whether a connection is serving a request and when it last finished one
struct Activity {
    in_flight: AtomicUsize,
    last_done: Mutex<Instant>,
}

impl Activity {
    fn new() -> Self {
        Self {
            in_flight: AtomicUsize::new(0),
            last_done: Mutex::new(Instant::now()),
        }
    }

    fn begin(self: &Arc<Self>) -> InFlight {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        InFlight(Arc::clone(self))
    }

    /// Time since the last request finished, or `None` while one is running
    fn idle_for(&self) -> Option<Duration> {
        if self.in_flight.load(Ordering::SeqCst) > 0 {
            return None;
        }
        let last_done = self.last_done.lock().unwrap_or_else(PoisonError::into_inner);
        Some(last_done.elapsed())
    }
}

/// Marks a request as running until dropped
struct InFlight(Arc<Activity>);

impl Drop for InFlight {
    fn drop(&mut self) {
        *self.0.last_done.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_is_not_idle_while_serving() {
        let activity = Arc::new(Activity::new());

        let first = activity.begin();
        assert_eq!(activity.idle_for(), None);
        drop(first);

        let idle = activity.idle_for().unwrap();
        assert!(idle < Duration::from_secs(1), "idle for {idle:?}");
    }

    #[test]
    fn test_activity_restarts_idle_clock_after_each_request() {
        let activity = Arc::new(Activity::new());
        std::thread::sleep(Duration::from_millis(50));
        let before = activity.idle_for().unwrap();
        assert!(before >= Duration::from_millis(50));

        drop(activity.begin());
        assert!(activity.idle_for().unwrap() < before);
    }
}
