//! Outbound message sinks and the writer task behind them.

use crate::ircmsg::{ClientCodec, ClientMsg};
use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::mpsc,
};
use tokio_util::{bytes::BytesMut, codec::Encoder};

/// Final destinations for [`ClientMsg`]s.
///
/// Most of the handler functions accept one of these instead of returning `Vec`s
/// full of client messages to send. Sending never blocks.
pub trait ClientMsgSink {
    /// Sends a [`ClientMsg`].
    fn send(&mut self, msg: ClientMsg);
}

impl ClientMsgSink for Vec<ClientMsg> {
    fn send(&mut self, msg: ClientMsg) {
        self.push(msg);
    }
}

impl<S: ClientMsgSink + ?Sized> ClientMsgSink for &mut S {
    fn send(&mut self, msg: ClientMsg) {
        (**self).send(msg);
    }
}

/// Sending half of a connection's outbound queue.
///
/// Every clone feeds the same writer task, which is what serializes writes:
/// lines from different senders never interleave.
#[derive(Clone, Debug)]
pub struct Outbox(mpsc::UnboundedSender<ClientMsg>);

impl Outbox {
    /// Creates a new outbox and the receiver to hand to [`run_writer`].
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ClientMsg>) {
        let (send, recv) = mpsc::unbounded_channel();
        (Outbox(send), recv)
    }
    /// Returns `true` if the writer has gone away.
    pub fn is_closed(&self) -> bool {
        self.0.is_closed()
    }
}

impl ClientMsgSink for Outbox {
    fn send(&mut self, msg: ClientMsg) {
        if self.0.send(msg).is_err() {
            tracing::debug!(target: "ircsession", "dropping message, writer is gone");
        }
    }
}

/// Writes every message from `queue` to `write` until every [`Outbox`] is dropped,
/// then flushes and shuts down the write half.
///
/// Messages already queued when the last sender goes away are still written.
pub async fn run_writer<W: AsyncWrite + Unpin>(
    mut write: W,
    mut queue: mpsc::UnboundedReceiver<ClientMsg>,
) -> std::io::Result<()> {
    let mut codec = ClientCodec::new();
    let mut buf = BytesMut::with_capacity(ClientMsg::MAX_LEN);
    while let Some(msg) = queue.recv().await {
        if msg.wire_len() > ClientMsg::MAX_LEN {
            tracing::warn!(target: "ircsession", "sending over-long line ({} bytes)", msg.wire_len());
        }
        codec.encode(msg, &mut buf)?;
        while let Ok(msg) = queue.try_recv() {
            codec.encode(msg, &mut buf)?;
        }
        write.write_all(&buf).await?;
        buf.clear();
        write.flush().await?;
    }
    write.flush().await?;
    write.shutdown().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ircmsg::Kind;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn writer_frames_and_drains() {
        let (client, mut server) = tokio::io::duplex(4096);
        let (mut outbox, queue) = Outbox::new();
        let writer = tokio::spawn(run_writer(client, queue));
        let mut other = outbox.clone();
        outbox.send(ClientMsg::nick("me"));
        other.send(ClientMsg::new(Kind::Ping).long("tok en"));
        drop(outbox);
        drop(other);
        writer.await.unwrap().unwrap();
        let mut out = String::new();
        server.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "NICK me\r\nPING :tok en\r\n");
    }
}
