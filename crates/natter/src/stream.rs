//! The stream (TCP) client.
//!
//! Two concurrent loops drive a stream session:
//!
//! 1. The **input loop** turns user lines into commands and outbound
//!    messages.
//! 2. The **receive loop** turns inbound lines into dispatcher calls.
//!
//! TCP already delivers bytes ordered and exactly once, so there is no
//! reliability layer here: no ids on the wire, no confirms, no
//! retransmission timer. Everything else (dispatcher table, session
//! guards, shutdown discipline) is shared with the datagram client.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::{Mutex, watch};

use natter_protocol::{Message, text};
use natter_session::{Phase, Session};
use natter_transport::{LineReader, LineWriter, StreamTransport};

use crate::NatterError;
use crate::client::{ChatClient, ClientConfig, ExitKind, Shutdown};
use crate::command;
use crate::dispatch;
use crate::output::UserLine;

/// A chat client speaking the text protocol over TCP.
pub struct StreamClient {
    session: Arc<Mutex<Session>>,
    reader: Option<LineReader>,
    writer: Arc<Mutex<LineWriter>>,
    phase: watch::Sender<Phase>,
    stop: Shutdown,
}

impl ChatClient for StreamClient {
    async fn connect(config: ClientConfig) -> Result<Self, NatterError> {
        let transport = StreamTransport::connect(&config.host, config.port).await?;
        let (reader, writer) = transport.split();
        let (phase, _rx) = watch::channel(Phase::Unauthenticated);
        Ok(Self {
            session: Arc::new(Mutex::new(Session::new())),
            reader: Some(reader),
            writer: Arc::new(Mutex::new(writer)),
            phase,
            stop: Shutdown::new(),
        })
    }

    async fn run(self) -> Result<ExitKind, NatterError> {
        self.run_from(tokio::io::stdin()).await
    }

    async fn send_bye(&self) -> Result<(), NatterError> {
        send_bye(&self.session, &self.writer).await
    }
}

impl StreamClient {
    /// Runs the session with an explicit input source. [`ChatClient::run`]
    /// passes stdin; integration tests script the input instead.
    pub async fn run_from<R>(mut self, input: R) -> Result<ExitKind, NatterError>
    where
        R: AsyncRead + Unpin,
    {
        // `run` consumes the client, so the reader is still present.
        let reader = self.reader.take().expect("reader is set at connect");

        let receive = tokio::spawn(receive_loop(
            reader,
            Arc::clone(&self.session),
            self.phase.clone(),
            self.stop.clone(),
        ));

        input_loop(input, &self.session, &self.writer, &self.phase, &self.stop).await;

        // Input ended or another loop asked for shutdown. Fix the exit
        // kind (first trigger wins), say goodbye best-effort, and wait
        // for the receive loop to observe the stop signal.
        self.stop.trigger(ExitKind::Clean);
        self.session.lock().await.terminate();
        if let Err(err) = send_bye(&self.session, &self.writer).await {
            tracing::debug!(error = %err, "farewell BYE not delivered");
        }
        if let Err(err) = self.writer.lock().await.shutdown().await {
            tracing::debug!(error = %err, "write half close failed");
        }
        let _ = receive.await;

        Ok(self.stop.exit_kind().unwrap_or(ExitKind::Clean))
    }
}

// ---------------------------------------------------------------------------
// Loops
// ---------------------------------------------------------------------------

/// Reads user lines until end of input or shutdown.
async fn input_loop<R>(
    input: R,
    session: &Mutex<Session>,
    writer: &Mutex<LineWriter>,
    phase: &watch::Sender<Phase>,
    stop: &Shutdown,
) where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(input).lines();
    let mut stop_rx = stop.subscribe();
    let mut phase_rx = phase.subscribe();

    loop {
        let next = tokio::select! {
            _ = stop_rx.changed() => break,
            next = lines.next_line() => next,
        };
        let line = match next {
            Ok(Some(line)) => line,
            Ok(None) => {
                tracing::info!("end of input");
                break;
            }
            Err(err) => {
                tracing::debug!(error = %err, "input read failed");
                break;
            }
        };

        let cmd = match command::parse(&line) {
            Ok(Some(cmd)) => cmd,
            Ok(None) => continue,
            Err(err) => {
                UserLine::Error(err.to_string()).emit();
                continue;
            }
        };

        let outcome = {
            let mut session = session.lock().await;
            let outcome = dispatch::dispatch_command(&mut session, cmd);
            phase.send_replace(session.phase());
            outcome
        };
        for line in &outcome.lines {
            line.emit();
        }

        let Some(msg) = outcome.send else { continue };
        let encoded = match text::encode(&msg) {
            Ok(encoded) => encoded,
            Err(err) => {
                // User commands only produce textual kinds; a failure here
                // is a bug, but it must not kill the loop.
                tracing::error!(error = %err, "failed to encode outbound message");
                continue;
            }
        };
        if let Err(err) = writer.lock().await.send_line(&encoded).await {
            UserLine::Error(format!("send failed: {err}")).emit();
            stop.trigger(ExitKind::ServerError);
            break;
        }
        tracing::debug!(kind = %msg.kind(), "message sent");

        if outcome.await_reply {
            // The auth handshake is synchronous: hold further input until
            // the verdict (or shutdown) arrives.
            tokio::select! {
                _ = stop_rx.changed() => break,
                changed = phase_rx.wait_for(|p| *p != Phase::Authenticating) => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
    }
}

/// Receives server lines until the peer goes away or shutdown.
async fn receive_loop(
    mut reader: LineReader,
    session: Arc<Mutex<Session>>,
    phase: watch::Sender<Phase>,
    stop: Shutdown,
) {
    let mut stop_rx = stop.subscribe();

    loop {
        let next = tokio::select! {
            _ = stop_rx.changed() => break,
            next = reader.next_line() => next,
        };
        match next {
            Ok(Some(line)) => {
                let outcome = {
                    let mut session = session.lock().await;
                    let outcome = match text::decode(&line) {
                        Ok(msg) => dispatch::dispatch_inbound(&mut session, msg),
                        Err(err) => dispatch::dispatch_decode_failure(&err),
                    };
                    phase.send_replace(session.phase());
                    outcome
                };
                for line in &outcome.lines {
                    line.emit();
                }
                if let Some(kind) = outcome.exit {
                    stop.trigger(kind);
                    break;
                }
            }
            Ok(None) => {
                // EOF without a BYE; during our own shutdown the trigger
                // loses to the earlier one and stays silent.
                if stop.trigger(ExitKind::ServerError) {
                    UserLine::Error("server closed the connection".into()).emit();
                }
                break;
            }
            Err(err) => {
                if stop.trigger(ExitKind::ServerError) {
                    UserLine::Error(format!("connection lost: {err}")).emit();
                }
                break;
            }
        }
    }
}

/// Sends a best-effort `BYE FROM <displayName>`, skipped when the session
/// never authenticated.
async fn send_bye(
    session: &Mutex<Session>,
    writer: &Mutex<LineWriter>,
) -> Result<(), NatterError> {
    let display_name = {
        let session = session.lock().await;
        if !session.is_authenticated() {
            tracing::debug!("never authenticated, skipping BYE");
            return Ok(());
        }
        session.display_name().to_owned()
    };
    let line = text::encode(&Message::Bye { display_name })?;
    writer.lock().await.send_line(&line).await?;
    tracing::info!("BYE sent");
    Ok(())
}
