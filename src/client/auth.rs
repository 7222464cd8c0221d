//! SASL PLAIN authentication.

use crate::{
    config::Credentials,
    ircmsg::{ClientMsg, Kind, ServerMsg},
};
use base64::Engine;

/// Maximum length of one AUTHENTICATE argument.
pub const CHUNK_LEN: usize = 400;

/// Returns the [`ClientMsg`] for aborting authentication.
pub fn msg_abort() -> ClientMsg {
    ClientMsg::new(Kind::Authenticate).arg("*")
}

/// Returns the raw PLAIN message for `creds`: `authzid NUL authcid NUL password`,
/// with an empty authzid.
pub fn plain_payload(creds: &Credentials) -> Vec<u8> {
    let user = creds.username.as_bytes();
    let pass = creds.password.reveal().as_bytes();
    let mut payload = Vec::with_capacity(user.len() + pass.len() + 2);
    payload.push(0);
    payload.extend_from_slice(user);
    payload.push(0);
    payload.extend_from_slice(pass);
    payload
}

/// Base64-encodes `payload` and splits it into AUTHENTICATE messages.
///
/// If the final chunk is exactly [`CHUNK_LEN`] bytes long (or the payload is empty),
/// a lone `+` follows so the server knows the payload is complete.
pub fn encode_chunks(payload: &[u8]) -> Vec<ClientMsg> {
    let encoded = base64::engine::general_purpose::STANDARD.encode(payload);
    let mut msgs: Vec<ClientMsg> = encoded
        .as_bytes()
        .chunks(CHUNK_LEN)
        // Base64 output is ASCII, so every chunk boundary is a char boundary.
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .map(|chunk| ClientMsg::new(Kind::Authenticate).arg(chunk))
        .collect();
    if encoded.len() % CHUNK_LEN == 0 {
        msgs.push(ClientMsg::new(Kind::Authenticate).arg("+"));
    }
    msgs
}

/// An authentication step.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum SaslAction {
    /// These messages need to be sent.
    Send(Vec<ClientMsg>),
    /// The server says we're logged in as this account. Not the end of the exchange.
    LoggedIn(String),
    /// Authentication succeeded.
    Authed,
    /// Authentication failed for this reason.
    Failed(String),
    /// Nothing to do for this message.
    Wait,
}

/// Handler for a SASL PLAIN exchange.
#[derive(Clone, Debug)]
pub struct SaslPlain {
    creds: Credentials,
    sent: bool,
}

impl SaslPlain {
    /// Creates a new authenticator, along with the message that starts the exchange.
    pub fn new(creds: Credentials) -> (ClientMsg, Self) {
        (ClientMsg::new(Kind::Authenticate).arg("PLAIN"), SaslPlain { creds, sent: false })
    }
    /// Handles a server message that may be part of the exchange.
    pub fn handle(&mut self, msg: &ServerMsg) -> SaslAction {
        let reason = || msg.args.last().unwrap_or_default().to_owned();
        match (&msg.kind, msg.kind.numeric()) {
            (Kind::Authenticate, _) => {
                if self.sent {
                    tracing::warn!(target: "ircsession", "unexpected SASL challenge after reply");
                    return SaslAction::Wait;
                }
                if msg.args.get(0) != Some("+") {
                    // PLAIN has no challenge to answer; anything else is bogus.
                    return SaslAction::Failed(format!(
                        "unexpected challenge {:?}",
                        msg.args.get(0).unwrap_or_default()
                    ));
                }
                self.sent = true;
                SaslAction::Send(encode_chunks(&plain_payload(&self.creds)))
            }
            (_, Some(900)) => SaslAction::LoggedIn(msg.args.get(2).unwrap_or_default().to_owned()),
            (_, Some(903 | 907)) => SaslAction::Authed,
            (_, Some(902 | 904 | 905 | 906)) => SaslAction::Failed(reason()),
            (_, Some(908)) => {
                SaslAction::Failed(format!("PLAIN unsupported, server offers {}", reason()))
            }
            _ => SaslAction::Wait,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(msgs: &[ClientMsg]) -> Vec<String> {
        msgs.iter().map(|m| m.args.get(0).unwrap_or_default().to_owned()).collect()
    }

    #[test]
    fn plain_encoding() {
        let creds = Credentials::new("foobar", "12345");
        assert_eq!(plain_payload(&creds), b"\0foobar\012345");
        let msgs = encode_chunks(&plain_payload(&creds));
        assert_eq!(payload(&msgs), ["AGZvb2JhcgAxMjM0NQ=="]);
        assert_eq!(msgs[0].to_string(), "AUTHENTICATE AGZvb2JhcgAxMjM0NQ==");
    }

    #[test]
    fn chunking_boundaries() {
        // 300 raw bytes encode to exactly 400 base64 bytes.
        let exact = encode_chunks(&[b'x'; 300]);
        assert_eq!(exact.len(), 2);
        assert_eq!(payload(&exact)[0].len(), 400);
        assert_eq!(payload(&exact)[1], "+");
        let longer = encode_chunks(&[b'x'; 301]);
        assert_eq!(longer.len(), 2);
        assert_eq!(payload(&longer)[1].len(), 4);
        assert_eq!(payload(&encode_chunks(&[])), ["+"]);
    }

    #[test]
    fn exchange() {
        let (start, mut sasl) = SaslPlain::new(Credentials::new("me", "pw"));
        assert_eq!(start.to_string(), "AUTHENTICATE PLAIN");
        let plus = ServerMsg::parse("AUTHENTICATE +").unwrap();
        assert!(matches!(sasl.handle(&plus), SaslAction::Send(m) if m.len() == 1));
        assert_eq!(sasl.handle(&plus), SaslAction::Wait);
        let logged = ServerMsg::parse(":s 900 me me!u@h me :You are now logged in").unwrap();
        assert_eq!(sasl.handle(&logged), SaslAction::LoggedIn("me".into()));
        let ok = ServerMsg::parse(":s 903 me :SASL authentication successful").unwrap();
        assert_eq!(sasl.handle(&ok), SaslAction::Authed);
        let fail = ServerMsg::parse(":s 904 me :SASL authentication failed").unwrap();
        assert_eq!(sasl.handle(&fail), SaslAction::Failed("SASL authentication failed".into()));
    }
}
