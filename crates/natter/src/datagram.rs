//! The datagram (UDP) client.
//!
//! Three concurrent loops drive a datagram session:
//!
//! 1. The **input loop** turns user lines into confirmed sends.
//! 2. The **receive loop** decodes datagrams, feeds the dispatcher, and
//!    answers with `CONFIRM`s.
//! 3. The **retransmission timer loop** sweeps the pending table on a
//!    fixed period and resends or gives up on unconfirmed datagrams.
//!
//! All three share one [`SharedState`] behind a single mutex. Every state
//! decision (dispatching, registering, sweeping) happens under that lock,
//! and retransmissions are sent while still holding it, which makes
//! confirm processing and timeout processing for the same id mutually
//! exclusive: whichever takes the lock first wins and the loser finds no
//! entry.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::{Mutex, watch};

use natter_protocol::{Message, MessageId, binary};
use natter_reliability::ReliabilityManager;
use natter_session::{Phase, Session};
use natter_transport::DatagramTransport;

use crate::NatterError;
use crate::client::{ChatClient, ClientConfig, ExitKind, Shutdown};
use crate::command;
use crate::dispatch;
use crate::output::UserLine;

/// Ceiling on the retransmission timer period. Confirm timeouts shorter
/// than this tighten the period so a due entry never waits a full extra
/// tick.
const SWEEP_TICK: Duration = Duration::from_millis(100);

/// Session state and reliability state together behind one lock: the
/// single mutual-exclusion discipline every loop follows.
struct SharedState {
    session: Session,
    reliability: ReliabilityManager,
}

/// A chat client speaking the binary protocol over UDP, with confirms,
/// duplicate suppression, and timeout-driven retransmission on top.
pub struct DatagramClient {
    shared: Arc<Mutex<SharedState>>,
    transport: Arc<DatagramTransport>,
    phase: watch::Sender<Phase>,
    stop: Shutdown,
}

impl ChatClient for DatagramClient {
    async fn connect(config: ClientConfig) -> Result<Self, NatterError> {
        let transport = DatagramTransport::connect(&config.host, config.port).await?;
        let (phase, _rx) = watch::channel(Phase::Unauthenticated);
        Ok(Self {
            shared: Arc::new(Mutex::new(SharedState {
                session: Session::new(),
                reliability: ReliabilityManager::new(config.retry),
            })),
            transport: Arc::new(transport),
            phase,
            stop: Shutdown::new(),
        })
    }

    async fn run(self) -> Result<ExitKind, NatterError> {
        self.run_from(tokio::io::stdin()).await
    }

    async fn send_bye(&self) -> Result<(), NatterError> {
        send_bye(&self.shared, &self.transport).await
    }
}

impl DatagramClient {
    /// The local address the client socket is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the session with an explicit input source. [`ChatClient::run`]
    /// passes stdin; integration tests script the input instead.
    pub async fn run_from<R>(self, input: R) -> Result<ExitKind, NatterError>
    where
        R: AsyncRead + Unpin,
    {
        let receive = tokio::spawn(receive_loop(
            Arc::clone(&self.transport),
            Arc::clone(&self.shared),
            self.phase.clone(),
            self.stop.clone(),
        ));
        let timer = tokio::spawn(retransmit_loop(
            Arc::clone(&self.transport),
            Arc::clone(&self.shared),
            self.phase.clone(),
            self.stop.clone(),
        ));

        input_loop(input, &self.shared, &self.transport, &self.phase, &self.stop).await;

        self.stop.trigger(ExitKind::Clean);
        self.shared.lock().await.session.terminate();
        if let Err(err) = send_bye(&self.shared, &self.transport).await {
            tracing::debug!(error = %err, "farewell BYE not delivered");
        }
        let _ = tokio::join!(receive, timer);

        Ok(self.stop.exit_kind().unwrap_or(ExitKind::Clean))
    }
}

// ---------------------------------------------------------------------------
// Sending
// ---------------------------------------------------------------------------

/// Encodes, registers, and transmits one confirmed send.
///
/// The shared lock is held across the transmit, so no confirm or sweep
/// can touch the new entry before its first transmission is on the wire.
async fn send_reliable(
    shared: &Mutex<SharedState>,
    transport: &DatagramTransport,
    msg: &Message,
) -> Result<(), NatterError> {
    let mut guard = shared.lock().await;
    let id = guard.reliability.next_id();
    let bytes = binary::encode(msg, id)?;
    guard.reliability.register(id, msg.kind(), bytes.clone());
    transport.send(&bytes).await?;
    tracing::debug!(%id, kind = %msg.kind(), "message sent");
    Ok(())
}

/// Encodes and transmits one `CONFIRM`. Confirms are never themselves
/// confirmed, so there is nothing to register.
async fn send_confirm(
    transport: &DatagramTransport,
    ref_id: MessageId,
) -> Result<(), NatterError> {
    let bytes = binary::encode(&Message::Confirm { ref_id }, MessageId::ZERO)?;
    transport.send(&bytes).await?;
    tracing::trace!(%ref_id, "confirm sent");
    Ok(())
}

/// Sends a best-effort `BYE`: transmitted once, not registered, not
/// acknowledgment-gated. Skipped when the session never authenticated.
async fn send_bye(
    shared: &Mutex<SharedState>,
    transport: &DatagramTransport,
) -> Result<(), NatterError> {
    let bytes = {
        let mut guard = shared.lock().await;
        let state = &mut *guard;
        if !state.session.is_authenticated() {
            tracing::debug!("never authenticated, skipping BYE");
            return Ok(());
        }
        let id = state.reliability.next_id();
        binary::encode(
            &Message::Bye {
                display_name: state.session.display_name().to_owned(),
            },
            id,
        )?
    };
    transport.send(&bytes).await?;
    tracing::info!("BYE sent");
    Ok(())
}

// ---------------------------------------------------------------------------
// Loops
// ---------------------------------------------------------------------------

/// Reads user lines until end of input or shutdown.
async fn input_loop<R>(
    input: R,
    shared: &Mutex<SharedState>,
    transport: &DatagramTransport,
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
            let mut guard = shared.lock().await;
            let state = &mut *guard;
            let outcome = dispatch::dispatch_command(&mut state.session, cmd);
            phase.send_replace(state.session.phase());
            outcome
        };
        for line in &outcome.lines {
            line.emit();
        }

        let Some(msg) = outcome.send else { continue };
        match send_reliable(shared, transport, &msg).await {
            Ok(()) => {}
            Err(NatterError::Protocol(err)) => {
                // Encode failures (oversized content, NUL bytes) are the
                // user's problem, not the link's: report and carry on.
                UserLine::Error(err.to_string()).emit();
                if outcome.await_reply {
                    let mut guard = shared.lock().await;
                    guard.session.auth_failed();
                    phase.send_replace(guard.session.phase());
                }
                continue;
            }
            Err(err) => {
                UserLine::Error(format!("send failed: {err}")).emit();
                stop.trigger(ExitKind::ServerError);
                break;
            }
        }

        if outcome.await_reply {
            // The auth handshake is synchronous: hold further input until
            // the verdict arrives. A delivery failure also resolves this,
            // by rolling the phase back.
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

/// Receives datagrams until the transport fails or shutdown.
async fn receive_loop(
    transport: Arc<DatagramTransport>,
    shared: Arc<Mutex<SharedState>>,
    phase: watch::Sender<Phase>,
    stop: Shutdown,
) {
    let mut stop_rx = stop.subscribe();
    let mut buf = vec![0u8; binary::MAX_DATAGRAM + 64];

    loop {
        let next = tokio::select! {
            _ = stop_rx.changed() => break,
            next = transport.recv(&mut buf) => next,
        };
        let n = match next {
            Ok(n) => n,
            Err(err) => {
                if stop.trigger(ExitKind::ServerError) {
                    UserLine::Error(format!("connection lost: {err}")).emit();
                }
                break;
            }
        };

        let outcome = match binary::decode(&buf[..n]) {
            Ok((id, msg)) => {
                let mut guard = shared.lock().await;
                let state = &mut *guard;
                let outcome =
                    dispatch::dispatch_datagram(&mut state.session, &mut state.reliability, id, msg);
                phase.send_replace(state.session.phase());
                outcome
            }
            // Nothing trustworthy to confirm in a datagram we could not
            // decode.
            Err(err) => dispatch::dispatch_decode_failure(&err),
        };

        for line in &outcome.lines {
            line.emit();
        }
        if let Some(ref_id) = outcome.confirm {
            if let Err(err) = send_confirm(&transport, ref_id).await {
                tracing::debug!(error = %err, "confirm not sent");
            }
        }
        if let Some(kind) = outcome.exit {
            stop.trigger(kind);
            break;
        }
    }
}

/// Sweeps the pending table on a fixed period, retransmitting or giving
/// up per the retry policy.
async fn retransmit_loop(
    transport: Arc<DatagramTransport>,
    shared: Arc<Mutex<SharedState>>,
    phase: watch::Sender<Phase>,
    stop: Shutdown,
) {
    let mut stop_rx = stop.subscribe();
    let period = {
        let guard = shared.lock().await;
        guard.reliability.config().timeout.min(SWEEP_TICK)
    };
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = stop_rx.changed() => break,
            _ = ticker.tick() => {}
        }

        let mut lines = Vec::new();
        let mut transport_down = false;
        {
            let mut guard = shared.lock().await;
            let state = &mut *guard;
            let sweep = state.reliability.sweep(Instant::now());
            // Resends happen under the lock, so a confirm accepted by the
            // receive loop can never interleave with a retransmission of
            // the same id.
            for (id, bytes) in &sweep.retransmit {
                if let Err(err) = transport.send(bytes).await {
                    tracing::debug!(%id, error = %err, "retransmission failed");
                    transport_down = true;
                    break;
                }
            }
            for (id, kind) in sweep.failed {
                let outcome = dispatch::on_delivery_failure(&mut state.session, kind, id);
                lines.extend(outcome.lines);
            }
            phase.send_replace(state.session.phase());
        }

        for line in &lines {
            line.emit();
        }
        if transport_down {
            if stop.trigger(ExitKind::ServerError) {
                UserLine::Error("connection lost while retransmitting".into()).emit();
            }
            break;
        }
    }
}
