//! Session driver
//!
//! Runs one subscriber connection over any message sink/stream pair, so the
//! same code serves axum WebSockets and in-memory channels in tests.

use std::fmt::Display;
use std::sync::Arc;

use axum::extract::ws::{Message, Utf8Bytes};
use bytes::Bytes;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::config::{SessionConfig, MIN_TICK_INTERVAL};
use super::context::SessionContext;
use super::state::{CloseReason, SessionState};
use crate::broadcast::wire::encode_snapshot;
use crate::broadcast::{ConnectionStatus, KeepAlive};
use crate::error::Result;
use crate::registry::Scope;
use crate::relay::{now_millis, Relay, SubscriptionHandle};

/// Pending pong replies; pings beyond this are answered by later pongs
const PONG_QUEUE: usize = 4;

/// Messages written by the outbound duty
#[derive(Debug, Default)]
struct OutboundCounters {
    messages: u64,
    keep_alives: u64,
    refreshes: u64,
    pongs: u64,
}

/// One subscriber connection
pub struct Session {
    ctx: SessionContext,
    relay: Arc<Relay>,
    config: SessionConfig,
    state: SessionState,
    shutdown: CancellationToken,
}

impl Session {
    /// Create a session for an accepted connection
    pub fn new(ctx: SessionContext, relay: Arc<Relay>, config: SessionConfig) -> Self {
        Self {
            ctx,
            relay,
            config,
            state: SessionState::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// End the session when `shutdown` is cancelled
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Session context
    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    /// Current state
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Drive the connection until either side ends it
    ///
    /// Returns the final state. Fails only when registration is refused; the
    /// transport is closed in that case too.
    pub async fn run<W, R, E>(mut self, mut sink: W, mut stream: R) -> Result<SessionState>
    where
        W: Sink<Message> + Unpin,
        W::Error: Display,
        R: Stream<Item = std::result::Result<Message, E>> + Unpin,
        E: Display,
    {
        let scope = self.ctx.scope.clone();

        let subscription = match self.relay.subscribe(scope.clone()).await {
            Ok(subscription) => subscription,
            Err(e) => {
                self.state.close(CloseReason::Rejected(e.to_string()));
                let _ = sink.close().await;
                tracing::warn!(session_id = self.ctx.session_id, scope = %scope, error = %e, "Subscription refused");
                return Err(e.into());
            }
        };
        let (handle, mut outbound) = subscription.into_parts();

        self.state.register(handle.id());
        self.relay.stats().session_opened();
        tracing::info!(
            session_id = self.ctx.session_id,
            subscriber = %handle.id(),
            scope = %scope,
            peer = ?self.ctx.peer_addr,
            "Subscriber connected"
        );

        let greeting = ConnectionStatus::connected(&scope, now_millis()).encode();
        if let Err(e) = write_encoded(&mut sink, greeting).await {
            self.teardown(&handle, outbound, &mut sink, CloseReason::WriteError(e))
                .await;
            return Ok(self.state);
        }
        self.state.start_streaming();

        let cancel = self.shutdown.child_token();
        let (pong_tx, mut pong_rx) = mpsc::channel::<Bytes>(PONG_QUEUE);

        let outbound_duty = async {
            let mut counters = OutboundCounters::default();
            let reason = self
                .outbound_duty(&scope, &mut sink, &mut outbound, &mut pong_rx, &cancel, &mut counters)
                .await;
            cancel.cancel();
            (reason, counters)
        };

        let inbound_duty = async {
            let reason = inbound_duty(&mut stream, pong_tx, &cancel).await;
            cancel.cancel();
            reason
        };

        let ((out_reason, counters), in_reason) = tokio::join!(outbound_duty, inbound_duty);

        self.state.messages_sent = counters.messages;
        self.state.keep_alives_sent = counters.keep_alives;
        self.state.refreshes_sent = counters.refreshes;
        self.state.pongs_sent = counters.pongs;

        let reason = out_reason.or(in_reason).unwrap_or(CloseReason::Shutdown);
        self.teardown(&handle, outbound, &mut sink, reason).await;

        Ok(self.state)
    }

    /// Write channel messages, keep-alives, refreshes and pongs
    ///
    /// Returns `None` when cancelled from elsewhere.
    async fn outbound_duty<W>(
        &self,
        scope: &Scope,
        sink: &mut W,
        outbound: &mut mpsc::Receiver<Bytes>,
        pongs: &mut mpsc::Receiver<Bytes>,
        cancel: &CancellationToken,
        counters: &mut OutboundCounters,
    ) -> Option<CloseReason>
    where
        W: Sink<Message> + Unpin,
        W::Error: Display,
    {
        let keep_alive_every = self.config.keep_alive_interval.max(MIN_TICK_INTERVAL);
        let mut keep_alive = interval_at(Instant::now() + keep_alive_every, keep_alive_every);
        keep_alive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let refresh_every = self.config.refresh_interval.max(MIN_TICK_INTERVAL);
        let mut refresh = interval_at(Instant::now() + refresh_every, refresh_every);
        refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let written = tokio::select! {
                biased;

                _ = cancel.cancelled() => return None,

                Some(payload) = pongs.recv() => {
                    counters.pongs += 1;
                    sink.send(Message::Pong(payload)).await.map_err(|e| e.to_string())
                }

                message = outbound.recv() => match message {
                    Some(message) => {
                        counters.messages += 1;
                        write_text(sink, &message).await
                    }
                    None => return Some(CloseReason::ChannelClosed),
                },

                _ = keep_alive.tick() => {
                    counters.keep_alives += 1;
                    write_encoded(sink, KeepAlive::for_scope(scope, now_millis()).encode()).await
                }

                _ = refresh.tick() => match self.refreshed_snapshot(scope).await {
                    Some(message) => {
                        counters.refreshes += 1;
                        write_text(sink, &message).await
                    }
                    None => Ok(()),
                },
            };

            if let Err(e) = written {
                return Some(CloseReason::WriteError(e));
            }
        }
    }

    /// Current snapshot restamped with the present time
    async fn refreshed_snapshot(&self, scope: &Scope) -> Option<Bytes> {
        let now = now_millis();
        let records: Vec<_> = self
            .relay
            .snapshot(scope)
            .await
            .iter()
            .map(|record| record.restamped(now))
            .collect();

        match encode_snapshot(scope, &records) {
            Ok(message) => message,
            Err(e) => {
                tracing::error!(session_id = self.ctx.session_id, error = %e, "Failed to encode refresh");
                None
            }
        }
    }

    /// Unregister, close the channel and transport; runs once
    async fn teardown<W>(
        &mut self,
        handle: &SubscriptionHandle,
        mut outbound: mpsc::Receiver<Bytes>,
        sink: &mut W,
        reason: CloseReason,
    ) where
        W: Sink<Message> + Unpin,
        W::Error: Display,
    {
        if !self.state.close(reason) {
            return;
        }

        self.relay.unsubscribe(handle).await;
        outbound.close();
        drop(outbound);

        if let Err(e) = sink.close().await {
            tracing::debug!(session_id = self.ctx.session_id, error = %e, "Transport close failed");
        }
        self.relay.stats().session_closed();

        tracing::info!(
            session_id = self.ctx.session_id,
            subscriber = %handle.id(),
            scope = %handle.scope(),
            reason = ?self.state.close_reason,
            messages_sent = self.state.messages_sent,
            duration_secs = self.state.duration().as_secs(),
            "Subscriber disconnected"
        );
    }
}

/// Read until the peer closes, queueing pong replies
///
/// Returns `None` when cancelled from elsewhere.
async fn inbound_duty<R, E>(
    stream: &mut R,
    pongs: mpsc::Sender<Bytes>,
    cancel: &CancellationToken,
) -> Option<CloseReason>
where
    R: Stream<Item = std::result::Result<Message, E>> + Unpin,
    E: Display,
{
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => return None,
            next = stream.next() => next,
        };

        match next {
            Some(Ok(Message::Ping(payload))) => {
                if pongs.try_send(payload).is_err() {
                    tracing::debug!("Pong queue full, ping not answered");
                }
            }
            Some(Ok(Message::Close(frame))) => {
                tracing::debug!(frame = ?frame, "Close frame received");
                return Some(CloseReason::ClientClosed);
            }
            // Subscribers are receive-only; anything else is ignored
            Some(Ok(_)) => {}
            Some(Err(e)) => return Some(CloseReason::ReadError(e.to_string())),
            None => return Some(CloseReason::ClientClosed),
        }
    }
}

/// Write a UTF-8 JSON message as a text frame
async fn write_text<W>(sink: &mut W, message: &Bytes) -> std::result::Result<(), String>
where
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    // Shares the encoded buffer; subscribers never copy a frame
    let text = match Utf8Bytes::try_from(message.clone()) {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(error = %e, "Outbound message is not UTF-8, skipped");
            return Ok(());
        }
    };

    sink.send(Message::Text(text))
        .await
        .map_err(|e| e.to_string())
}

async fn write_encoded<W>(
    sink: &mut W,
    encoded: serde_json::Result<Bytes>,
) -> std::result::Result<(), String>
where
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    match encoded {
        Ok(message) => write_text(sink, &message).await,
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode control message");
            Ok(())
        }
    }
}
