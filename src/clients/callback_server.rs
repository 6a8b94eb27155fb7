//! Single-use local listener for the OAuth redirect.
//!
//! The socket is bound before the consent URL is shown and is released
//! before [`CallbackServer::wait_for_code`] returns, whatever the outcome.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::oneshot;
use warp::http::StatusCode;
use warp::Filter;

use crate::error::AuthError;
use crate::shutdown::Shutdown;

pub const CALLBACK_PATH: &str = "callback";

type CodeSender = Arc<Mutex<Option<oneshot::Sender<Result<String, AuthError>>>>>;

pub struct CallbackServer {
    listener: TcpListener,
    addr: SocketAddr,
    state: String,
}

impl CallbackServer {
    /// Binds `127.0.0.1:<port>`. Port 0 picks a free port. The redirect URI
    /// names the same address, so it does not depend on how `localhost`
    /// resolves.
    pub async fn bind(port: u16, state: impl Into<String>) -> Result<Self, AuthError> {
        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .map_err(|source| AuthError::Bind { port, source })?;
        let addr = listener.local_addr()?;
        Ok(Self {
            listener,
            addr,
            state: state.into(),
        })
    }

    pub fn redirect_uri(&self) -> String {
        format!("http://{}/{}", self.addr, CALLBACK_PATH)
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serves until the first valid callback, the timeout, or cancellation.
    pub async fn wait_for_code(
        self,
        timeout: Duration,
        shutdown: &Shutdown,
    ) -> Result<String, AuthError> {
        let (code_tx, code_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let sender: CodeSender = Arc::new(Mutex::new(Some(code_tx)));

        let routes = callback_route(self.state, sender);
        let server = warp::serve(routes)
            .incoming(self.listener)
            .graceful(async move {
                let _ = stop_rx.await;
            })
            .run();
        let server_task = tokio::spawn(server);

        let mut shutdown = shutdown.clone();
        let outcome = tokio::select! {
            received = code_rx => received.unwrap_or(Err(AuthError::Cancelled)),
            _ = tokio::time::sleep(timeout) => Err(AuthError::TimedOut(timeout)),
            _ = shutdown.cancelled() => Err(AuthError::Cancelled),
        };

        let _ = stop_tx.send(());
        if let Err(e) = server_task.await {
            tracing::warn!(error = %e, "callback server task ended abnormally");
        }
        tracing::debug!(addr = %self.addr, "callback server stopped");
        outcome
    }
}

fn callback_route(
    expected_state: String,
    sender: CodeSender,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    warp::path(CALLBACK_PATH)
        .and(warp::path::end())
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .map(move |query: HashMap<String, String>| {
            let (status, message, result) = handle_callback(&expected_state, &query);
            if let Some(result) = result {
                if let Ok(mut slot) = sender.lock() {
                    if let Some(tx) = slot.take() {
                        let _ = tx.send(result);
                    }
                }
            }
            warp::reply::with_status(warp::reply::html(render_page(message)), status)
        })
}

/// Decides the browser response and, when the callback settles the flow,
/// the result handed back to the waiter.
fn handle_callback(
    expected_state: &str,
    query: &HashMap<String, String>,
) -> (StatusCode, &'static str, Option<Result<String, AuthError>>) {
    if query.get("state").map(String::as_str) != Some(expected_state) {
        return (StatusCode::BAD_REQUEST, "state did not match", None);
    }
    if let Some(error) = query.get("error") {
        return (
            StatusCode::OK,
            "Authorization denied. You can close this window.",
            Some(Err(AuthError::Denied(error.clone()))),
        );
    }
    match query.get("code").filter(|c| !c.is_empty()) {
        Some(code) => (
            StatusCode::OK,
            "Authorization completed, you can close this window.",
            Some(Ok(code.clone())),
        ),
        None => (
            StatusCode::BAD_REQUEST,
            "No authorization code received.",
            None,
        ),
    }
}

fn render_page(message: &str) -> String {
    format!(
        "<html><body style=\"font-family: system-ui; text-align: center; padding: 40px;\">\
         <h2>{}</h2></body></html>",
        message
    )
}
