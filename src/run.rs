//! Application execution logic.
//!
//! Drives one [`Connection`] over the reqwest transport until it is done or
//! the user interrupts it, then prints the body or a JSON summary.

use std::collections::BTreeMap;
use std::future::Future;
use std::io::{self, Write};

use serde::Serialize;
use thiserror::Error;
use tokio::signal;

use urlclient::config::ValidatedConfig;
use urlclient::connection::Connection;
use urlclient::error::Error as ConnectionError;
use urlclient::message::Response;
use urlclient::time::TokioSleeper;
use urlclient::transport::{ConnectionState, ReqwestTransport, Transport, TransportError};

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;

/// Error type for runtime execution failures.
#[derive(Debug, Error)]
pub enum RunError {
    /// The transport could not be created.
    #[error("Failed to create transport: {0}")]
    Transport(#[from] TransportError),

    /// The connection finished with an error.
    #[error("Request failed: {0}")]
    Request(#[source] ConnectionError),

    /// The user interrupted the transfer.
    #[error("Request interrupted")]
    Interrupted,

    /// Writing the body or summary to stdout failed.
    #[error("Failed to write output: {0}")]
    Output(#[from] io::Error),

    /// The JSON summary could not be encoded.
    #[error("Failed to encode summary: {0}")]
    Summary(#[from] serde_json::Error),
}

/// Error details in the JSON summary.
#[derive(Debug, Serialize, PartialEq, Eq)]
struct ErrorSummary<'a> {
    domain: &'a str,
    code: i64,
    description: &'a str,
    known: bool,
}

/// What `--json` prints once the connection is done.
#[derive(Debug, Serialize)]
struct Summary<'a> {
    url: String,
    state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    status_code: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    redirect_count: Option<i32>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    headers: BTreeMap<&'a str, &'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    received_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resumed_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorSummary<'a>>,
}

impl<'a> Summary<'a> {
    fn new(
        url: String,
        state: ConnectionState,
        error: Option<&'a ConnectionError>,
        response: Option<&'a Response>,
    ) -> Self {
        Self {
            url,
            state: state.to_string(),
            status_code: response.map(Response::status_code),
            redirect_count: response.map(Response::redirect_count),
            headers: response
                .map(|r| r.headers().iter().collect())
                .unwrap_or_default(),
            received_bytes: response.map(Response::received_content_length),
            resumed_bytes: response.map(Response::resumed_content_length),
            file: response
                .and_then(Response::content_file_path)
                .map(|p| p.display().to_string()),
            body: response
                .and_then(Response::content_bytes)
                .map(|b| String::from_utf8_lossy(b).into_owned()),
            error: error.map(|e| ErrorSummary {
                domain: e.domain(),
                code: e.code(),
                description: e.description(),
                known: e.is_known(),
            }),
        }
    }

    fn of<T: Transport>(connection: &'a Connection<T>) -> Self {
        let url = connection
            .request()
            .and_then(|r| r.url())
            .map(ToString::to_string)
            .unwrap_or_default();

        Self::new(url, connection.state(), connection.error(), connection.response())
    }
}

/// Executes one request until it completes or Ctrl+C/SIGTERM arrives.
///
/// # Errors
///
/// Returns an error if:
/// - No transport can be created
/// - The user interrupts the transfer
/// - The connection finishes with an error
/// - The output cannot be written
///
/// # Coverage Note
///
/// This function is excluded from coverage because it requires
/// real signal handling and stdout.
#[cfg(not(tarpaulin_include))]
pub async fn execute(config: ValidatedConfig) -> Result<(), RunError> {
    let connection = fetch(&config, shutdown_signal()).await?;
    report(&config, &connection, &mut io::stdout().lock())
}

/// Runs the connection to completion, cancelling it if `interrupt` resolves first.
async fn fetch(
    config: &ValidatedConfig,
    interrupt: impl Future<Output = ()>,
) -> Result<Connection<ReqwestTransport>, RunError> {
    let transport = ReqwestTransport::try_current()?;
    let mut connection = Connection::new(transport)
        .with_request(config.request())
        .with_response_handler(config.response_handler())
        .with_timeout(config.timeout);

    let interrupted = tokio::select! {
        state = connection.wait_until_done(&TokioSleeper, config.poll_interval) => {
            tracing::debug!("Connection finished in state {state}");
            false
        }
        () = interrupt => true,
    };

    if interrupted {
        tracing::info!("Shutdown signal received, cancelling...");
        connection.cancel();
        return Err(RunError::Interrupted);
    }

    Ok(connection)
}

/// Prints the outcome to `out` and turns a connection error into [`RunError::Request`].
fn report<T: Transport>(
    config: &ValidatedConfig,
    connection: &Connection<T>,
    out: &mut impl Write,
) -> Result<(), RunError> {
    match connection.response() {
        Some(response) => log_response(response),
        None if connection.error().is_none() => {
            tracing::warn!("Connection ended in state {} without a response", connection.state());
        }
        None => {}
    }

    if config.json {
        serde_json::to_writer_pretty(&mut *out, &Summary::of(connection))?;
        writeln!(out)?;
    } else if connection.error().is_none() {
        if let Some(body) = connection.response().and_then(Response::content_bytes) {
            out.write_all(body)?;
        }
    }
    out.flush()?;

    match connection.error() {
        Some(error) => Err(RunError::Request(error.clone())),
        None => Ok(()),
    }
}

fn log_response(response: &Response) {
    tracing::info!(
        "HTTP {} ({} bytes received, {} redirects)",
        response.status_code(),
        response.received_content_length(),
        response.redirect_count(),
    );

    if let Some(path) = response.content_file_path() {
        tracing::info!(
            "Saved {} bytes to {}",
            response.acquired_content_length(),
            path.display()
        );
    }
}

/// Returns a future that completes when a shutdown signal is received.
///
/// Excluded from coverage - requires OS signal handling.
#[cfg(not(tarpaulin_include))]
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
