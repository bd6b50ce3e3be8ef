use crate::bridge::WizardBridge;
use crate::cookie::cookie_matches;
use crate::protocol::{FIELD_SEPARATOR, parse_request};
use anyhow::{Context, Result};
use cellar_core::{LineFramed, Terminator};
use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

pub const DEFAULT_PORT_START: u16 = 30000;
pub const DEFAULT_PORT_SPAN: u16 = 20;

/// Loopback listener for Setup Wizard callers.
#[derive(Debug)]
pub struct WizardServer {
    listener: TcpListener,
    port: u16,
    cookie: Arc<str>,
}

impl WizardServer {
    /// Bind 127.0.0.1 on the first free port in `[start, start + span)`.
    pub async fn bind(start: u16, span: u16, cookie: impl Into<Arc<str>>) -> Result<Self> {
        anyhow::ensure!(span > 0, "wizard port span must be at least 1");
        let end = start.saturating_add(span - 1);
        let mut last_error = None;

        for port in start..=end {
            match TcpListener::bind((Ipv4Addr::LOCALHOST, port)).await {
                Ok(listener) => {
                    let port = listener
                        .local_addr()
                        .context("failed to read wizard listener address")?
                        .port();
                    return Ok(Self {
                        listener,
                        port,
                        cookie: cookie.into(),
                    });
                }
                Err(error) => {
                    if error.kind() != ErrorKind::AddrInUse {
                        debug!(port, error = %error, "wizard port unavailable");
                    }
                    last_error = Some(error);
                }
            }
        }

        let error = last_error.map_or_else(|| anyhow::anyhow!("empty port range"), Into::into);
        Err(error.context(format!("no free wizard port in {start}..={end}")))
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn cookie(&self) -> &str {
        &self.cookie
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("failed to read wizard listener address")
    }

    /// Accept callers until cancelled, one task per connection.
    pub async fn serve(self, bridge: WizardBridge, cancel: CancellationToken) -> Result<()> {
        info!(port = self.port, "wizard server listening");

        loop {
            let accepted = tokio::select! {
                () = cancel.cancelled() => break,
                accepted = self.listener.accept() => accepted,
            };

            let (stream, peer) = match accepted {
                Ok(accepted) => accepted,
                Err(error) => {
                    warn!(error = %error, "failed to accept wizard connection");
                    continue;
                }
            };

            let bridge = bridge.clone();
            let cookie = Arc::clone(&self.cookie);
            let span = info_span!("wizard_request", %peer);
            tokio::spawn(
                async move {
                    if let Err(error) = handle_connection(stream, &bridge, &cookie).await {
                        debug!(error = %format!("{error:#}"), "wizard connection ended early");
                    }
                }
                .instrument(span),
            );
        }

        info!("wizard server stopped");
        Ok(())
    }
}

async fn handle_connection(stream: TcpStream, bridge: &WizardBridge, cookie: &str) -> Result<()> {
    let mut framed = LineFramed::new(stream, Terminator::Lf);
    let Some(line) = framed
        .read_line()
        .await
        .context("failed to read wizard request")?
    else {
        return Ok(());
    };

    let response = respond(&line, cookie, bridge).await;
    framed
        .write_raw(&response)
        .await
        .context("failed to write wizard response")?;
    framed
        .shutdown()
        .await
        .context("failed to close wizard connection")?;
    Ok(())
}

/// Resolve one request line to the string sent back. Rejected requests
/// never reach the mailbox and answer with the empty string.
pub async fn respond(line: &str, cookie: &str, bridge: &WizardBridge) -> String {
    let given = line.split(FIELD_SEPARATOR).next().unwrap_or_default();
    if !cookie_matches(cookie, given) {
        warn!("wizard request with a wrong cookie");
        return String::new();
    }

    let request = match parse_request(line) {
        Ok(request) => request,
        Err(error) => {
            warn!(error = %error, "rejecting wizard request");
            return String::new();
        }
    };

    let verb = request.command.verb();
    debug!(verb, "wizard request");
    let reply = bridge.submit(request.command).await;
    debug!(verb, ?reply, "wizard reply");
    reply.into_response()
}
