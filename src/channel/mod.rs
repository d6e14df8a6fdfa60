//! Framed, duplex, timeout-aware message transport (spec §3 `Channel`,
//! §5 suspension point (a)). A broker-backed channel stands in for the two
//! named FIFOs (`player-{id}:session-{sid}:{I|O}`) a real deployment would
//! open against the external broker; per the §9 redesign flag ("global
//! broker handle"), the stand-in here is a pair of `tokio::sync::mpsc`
//! queues rather than a hidden singleton client. A bot channel never talks
//! to the broker at all.

use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::net::ServerEvent;

/// Errors a `Channel` can raise. `ChannelClosed` and `MessageTimeout` are
/// both treated as player disconnection by callers (spec §7, Transport).
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel closed")]
    Closed,
    #[error("channel closed while receiving")]
    ChannelClosed,
    #[error("malformed message: {0}")]
    MessageFormatError(String),
    #[error("receive timed out")]
    MessageTimeout,
}

pub type ChannelResult<T> = Result<T, ChannelError>;

/// A single-ended FIFO over the shared broker — inbound (client → server)
/// or outbound (server → client), never both. Named after the broker key
/// it's bound to, e.g. `player-{id}:session-{sid}:I`.
pub struct MessageQueue<T> {
    name: String,
    sender: mpsc::Sender<T>,
    receiver: Option<mpsc::Receiver<T>>,
}

impl<T> MessageQueue<T> {
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        Self {
            name: name.into(),
            sender,
            receiver: Some(receiver),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sender(&self) -> mpsc::Sender<T> {
        self.sender.clone()
    }

    /// Takes ownership of the receiving half. A queue is single-ended: only
    /// one consumer ever pops from it, so this is called once at
    /// construction time and the result handed to whichever side reads.
    pub fn take_receiver(&mut self) -> Option<mpsc::Receiver<T>> {
        self.receiver.take()
    }
}

/// Abstract duplex message carrier. `Broker` is backed by two named FIFOs;
/// `Bot` is the pseudo-channel a bot's `PlayerServer` uses (spec §4.6):
/// `send` is a no-op, `recv` always raises `MessageTimeout`.
pub enum Channel<In, Out> {
    Broker {
        inbound: mpsc::Receiver<In>,
        outbound: mpsc::Sender<Out>,
        closed: bool,
    },
    Bot,
}

impl<In, Out> Channel<In, Out> {
    pub fn broker(inbound: mpsc::Receiver<In>, outbound: mpsc::Sender<Out>) -> Self {
        Channel::Broker {
            inbound,
            outbound,
            closed: false,
        }
    }

    pub fn bot() -> Self {
        Channel::Bot
    }

    pub fn is_bot(&self) -> bool {
        matches!(self, Channel::Bot)
    }

    /// Sends a message on the outbound side. A no-op for bot channels.
    pub async fn send(&self, msg: Out) -> ChannelResult<()> {
        match self {
            Channel::Broker { outbound, closed, .. } => {
                if *closed {
                    return Err(ChannelError::Closed);
                }
                outbound.send(msg).await.map_err(|_| ChannelError::Closed)
            }
            Channel::Bot => Ok(()),
        }
    }

    /// Waits up to `deadline` for the next inbound message. A bot channel
    /// always raises `MessageTimeout` immediately — bots are driven by the
    /// decision engine, never by an inbound message.
    pub async fn recv(&mut self, deadline: Duration) -> ChannelResult<In> {
        match self {
            Channel::Broker { inbound, closed, .. } => {
                if *closed {
                    return Err(ChannelError::Closed);
                }
                match timeout(deadline, inbound.recv()).await {
                    Ok(Some(msg)) => Ok(msg),
                    Ok(None) => {
                        *closed = true;
                        Err(ChannelError::ChannelClosed)
                    }
                    Err(_) => Err(ChannelError::MessageTimeout),
                }
            }
            Channel::Bot => Err(ChannelError::MessageTimeout),
        }
    }

    /// Marks the channel closed. Any outstanding or future `recv` fails
    /// with `ChannelClosed`; `send` fails with `Closed`.
    pub fn close(&mut self) {
        if let Channel::Broker { closed, inbound, .. } = self {
            *closed = true;
            inbound.close();
        }
    }
}

pub type InboundQueue = MessageQueue<crate::net::ClientMessage>;
pub type OutboundQueue = MessageQueue<ServerEvent>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::ClientMessage;

    #[tokio::test]
    async fn bot_channel_send_is_noop_and_recv_times_out() {
        let mut ch: Channel<ClientMessage, ServerEvent> = Channel::bot();
        ch.send(ServerEvent::FinalHandsStarted).await.unwrap();
        let err = ch.recv(Duration::from_millis(10)).await.unwrap_err();
        assert!(matches!(err, ChannelError::MessageTimeout));
    }

    #[tokio::test]
    async fn broker_channel_recv_times_out_without_message() {
        let (_tx, rx) = mpsc::channel::<ClientMessage>(4);
        let (out_tx, _out_rx) = mpsc::channel::<ServerEvent>(4);
        let mut ch = Channel::broker(rx, out_tx);
        let err = ch.recv(Duration::from_millis(10)).await.unwrap_err();
        assert!(matches!(err, ChannelError::MessageTimeout));
    }

    #[tokio::test]
    async fn closing_channel_fails_outstanding_recv_as_channel_closed() {
        let (tx, rx) = mpsc::channel::<ClientMessage>(4);
        let (out_tx, _out_rx) = mpsc::channel::<ServerEvent>(4);
        let mut ch = Channel::broker(rx, out_tx);
        drop(tx);
        let err = ch.recv(Duration::from_millis(50)).await.unwrap_err();
        assert!(matches!(err, ChannelError::ChannelClosed));
    }

    #[tokio::test]
    async fn send_after_close_errors() {
        let (_tx, rx) = mpsc::channel::<ClientMessage>(4);
        let (out_tx, _out_rx) = mpsc::channel::<ServerEvent>(4);
        let mut ch = Channel::broker(rx, out_tx);
        ch.close();
        let err = ch.send(ServerEvent::FinalHandsStarted).await.unwrap_err();
        assert!(matches!(err, ChannelError::Closed));
    }
}
