use super::{ClientMsg, ServerMsg};
use crate::error::ParseError;
use tokio_util::{
    bytes::BytesMut,
    codec::{Decoder, Encoder},
};

/// Encoder/decoder for raw IRC messages on a client.
///
/// Decodes [`ServerMsg`]s and encodes [`ClientMsg`]s.
/// Lines split across reads are reassembled; the decoder only yields once it has a full line.
///
/// Framing errors are I/O errors, but a line that frames fine and fails to tokenize
/// is yielded as an `Err` item so that the read loop can skip it and keep going.
#[derive(Clone, Copy, Debug, Default)]
pub struct ClientCodec {
    /// Set while throwing away the rest of an over-long line.
    discarding: bool,
}

impl ClientCodec {
    /// Creates a new codec.
    pub const fn new() -> Self {
        ClientCodec { discarding: false }
    }
    /// Writes a client message to `dst` WITH a trailing CRLF.
    ///
    /// Any CR, LF, or NUL inside the message is replaced with a space
    /// so that one message can never become two on the wire.
    pub fn write_to(msg: &ClientMsg, dst: &mut Vec<u8>) {
        let line = msg.to_string();
        dst.reserve(line.len() + 2);
        dst.extend(line.bytes().map(|b| if matches!(b, b'\r' | b'\n' | b'\0') { b' ' } else { b }));
        dst.extend_from_slice(b"\r\n");
    }
}

impl Decoder for ClientCodec {
    type Item = Result<ServerMsg, ParseError>;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let Some(idx) = src.iter().position(|b| *b == b'\n') else {
                if src.len() > ServerMsg::MAX_LEN {
                    // No newline in sight. Drop what we have and wait for the end of the line.
                    src.clear();
                    self.discarding = true;
                }
                return Ok(None);
            };
            let line = src.split_to(idx + 1);
            if std::mem::take(&mut self.discarding) || line.len() > ServerMsg::MAX_LEN {
                return Ok(Some(Err(ParseError::TooLong)));
            }
            let text = String::from_utf8_lossy(&line);
            if text.trim_matches(|c: char| c.is_ascii_whitespace()).is_empty() {
                // Blank keepalive lines. Some bouncers send these.
                continue;
            }
            return Ok(Some(ServerMsg::parse(&text)));
        }
    }
}

impl Encoder<ClientMsg> for ClientCodec {
    type Error = std::io::Error;

    fn encode(&mut self, item: ClientMsg, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let mut buf = Vec::with_capacity(item.wire_len());
        Self::write_to(&item, &mut buf);
        dst.extend_from_slice(&buf);
        Ok(())
    }
}
