//! Line codec for the identification protocol.
//!
//! Every message is one UTF-8 line. Commands are recognised by a fixed
//! prefix; handshake, commit and response payloads are small JSON records
//! whose integers are big-endian hex strings. Text wrapped in `%...%` is a
//! control notice (`%quit%` announces that the sender is leaving).

use std::fmt;

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

/// Prefix of handshake lines.
pub const HANDSHAKE_PREFIX: &str = "/handshake: ";
/// Prefix of commitment and challenge lines.
pub const COMMIT_PREFIX: &str = "/commit: ";
/// Prefix of response and verification lines.
pub const RESPONSE_PREFIX: &str = "/response: ";
/// Prefix of error lines.
pub const ERROR_PREFIX: &str = "/error: ";
/// Prefix of informational lines sent by the verifier.
pub const NOTICE_PREFIX: &str = "/notice: ";

const SUCCESS: &str = "Success";
const READ: &str = "/read";
const READ_ACCEPT: &str = "/read: accept.";
const TIME: &str = "/time";
const QUIT: &str = "/quit";
const QUIT_SHORT: &str = "/q";
const CONTROL_MARK: char = '%';

/// Name of the control notice a peer sends when it leaves.
pub const CONTROL_QUIT: &str = "quit";

/// A decoded protocol message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProtocolEvent {
    /// Prover presents its PEM certificate.
    Handshake(String),
    /// Verifier bound the prover's public key.
    HandshakeAccepted,
    /// Prover's commitment `K = (Kx, Ky)`.
    Commit {
        /// x coordinate of `K`.
        kx: BigUint,
        /// y coordinate of `K`.
        ky: BigUint,
    },
    /// Verifier's challenge `e`.
    Challenge(BigUint),
    /// Prover's response `r`.
    Response(BigUint),
    /// Verifier accepted the proof.
    Verified,
    /// Prover asks for the read privilege.
    ReadRequest,
    /// Verifier grants the read privilege.
    ReadAccept,
    /// Either side reports a failure.
    Error(String),
    /// Ask the verifier for its clock.
    Time,
    /// Ask the verifier to shut down.
    Quit,
    /// Informational text from the verifier.
    Notice(String),
    /// `%name%` control notice.
    Control(String),
    /// Any line that matches no command.
    Unrecognized(String),
}

impl ProtocolEvent {
    /// Short name of the event kind, safe to log.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Handshake(_) => "handshake",
            Self::HandshakeAccepted => "handshake-accepted",
            Self::Commit { .. } => "commit",
            Self::Challenge(_) => "challenge",
            Self::Response(_) => "response",
            Self::Verified => "verified",
            Self::ReadRequest => "read-request",
            Self::ReadAccept => "read-accept",
            Self::Error(_) => "error",
            Self::Time => "time",
            Self::Quit => "quit",
            Self::Notice(_) => "notice",
            Self::Control(_) => "control",
            Self::Unrecognized(_) => "unrecognized",
        }
    }

    /// True for the `%quit%` leaving notice.
    pub fn is_leave(&self) -> bool {
        matches!(self, Self::Control(name) if name == CONTROL_QUIT)
    }
}

/// Failure to decode the payload of a recognised command.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The JSON record after the prefix could not be parsed.
    #[error("malformed {kind} payload: {reason}")]
    MalformedPayload {
        /// Which command carried the payload.
        kind: &'static str,
        /// Parser message.
        reason: String,
    },

    /// A hex-encoded integer field is not valid hex.
    #[error("invalid hex in field {field}: {reason}")]
    InvalidHex {
        /// Field name on the wire.
        field: &'static str,
        /// Decoder message.
        reason: String,
    },

    /// A `%%` control bracket with no name inside.
    #[error("empty control notice")]
    EmptyControl,
}

#[derive(Serialize, Deserialize)]
struct HandshakePayload {
    #[serde(rename = "Cert")]
    cert: String,
}

#[derive(Serialize, Deserialize)]
struct CommitPayload {
    #[serde(rename = "Kx")]
    kx: String,
    #[serde(rename = "Ky")]
    ky: String,
}

#[derive(Serialize, Deserialize)]
struct ResponsePayload {
    #[serde(rename = "R")]
    r: String,
}

/// Decodes one wire line (with or without its terminator).
pub fn decode(line: &str) -> Result<ProtocolEvent, DecodeError> {
    let line = line.trim_end_matches(|c| c == '\r' || c == '\n');

    if let Some(payload) = line.strip_prefix(HANDSHAKE_PREFIX) {
        if payload == SUCCESS {
            return Ok(ProtocolEvent::HandshakeAccepted);
        }
        let record: HandshakePayload = parse_record("handshake", payload)?;
        return Ok(ProtocolEvent::Handshake(record.cert));
    }

    if let Some(payload) = line.strip_prefix(COMMIT_PREFIX) {
        // The verifier's challenge shares the commit prefix but is bare hex.
        if payload.trim_start().starts_with('{') {
            let record: CommitPayload = parse_record("commit", payload)?;
            return Ok(ProtocolEvent::Commit {
                kx: parse_hex("Kx", &record.kx)?,
                ky: parse_hex("Ky", &record.ky)?,
            });
        }
        return Ok(ProtocolEvent::Challenge(parse_hex("e", payload)?));
    }

    if let Some(payload) = line.strip_prefix(RESPONSE_PREFIX) {
        if payload == SUCCESS {
            return Ok(ProtocolEvent::Verified);
        }
        let record: ResponsePayload = parse_record("response", payload)?;
        return Ok(ProtocolEvent::Response(parse_hex("R", &record.r)?));
    }

    if let Some(reason) = line.strip_prefix(ERROR_PREFIX) {
        return Ok(ProtocolEvent::Error(reason.to_string()));
    }

    if let Some(text) = line.strip_prefix(NOTICE_PREFIX) {
        return Ok(ProtocolEvent::Notice(text.to_string()));
    }

    if line == READ_ACCEPT {
        return Ok(ProtocolEvent::ReadAccept);
    }
    // Anything after `/read` is ignored.
    if line.starts_with(READ) {
        return Ok(ProtocolEvent::ReadRequest);
    }

    let event = match line {
        TIME => ProtocolEvent::Time,
        QUIT | QUIT_SHORT => ProtocolEvent::Quit,
        _ => match control_name(line) {
            Some("") => return Err(DecodeError::EmptyControl),
            Some(name) => ProtocolEvent::Control(name.to_string()),
            None => ProtocolEvent::Unrecognized(line.to_string()),
        },
    };
    Ok(event)
}

/// Encodes an event as a wire line including the `\n` terminator.
pub fn encode(event: &ProtocolEvent) -> String {
    format!("{event}\n")
}

impl fmt::Display for ProtocolEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handshake(cert) => {
                let record = HandshakePayload { cert: cert.clone() };
                write!(f, "{HANDSHAKE_PREFIX}{}", to_json(&record)?)
            }
            Self::HandshakeAccepted => write!(f, "{HANDSHAKE_PREFIX}{SUCCESS}"),
            Self::Commit { kx, ky } => {
                let record = CommitPayload {
                    kx: to_hex(kx),
                    ky: to_hex(ky),
                };
                write!(f, "{COMMIT_PREFIX}{}", to_json(&record)?)
            }
            Self::Challenge(e) => write!(f, "{COMMIT_PREFIX}{}", to_hex(e)),
            Self::Response(r) => {
                let record = ResponsePayload { r: to_hex(r) };
                write!(f, "{RESPONSE_PREFIX}{}", to_json(&record)?)
            }
            Self::Verified => write!(f, "{RESPONSE_PREFIX}{SUCCESS}"),
            Self::ReadRequest => f.write_str(READ),
            Self::ReadAccept => f.write_str(READ_ACCEPT),
            Self::Error(reason) => write!(f, "{ERROR_PREFIX}{}", single_line(reason)),
            Self::Time => f.write_str(TIME),
            Self::Quit => f.write_str(QUIT),
            Self::Notice(text) => write!(f, "{NOTICE_PREFIX}{}", single_line(text)),
            Self::Control(name) => {
                write!(f, "{CONTROL_MARK}{}{CONTROL_MARK}", single_line(name))
            }
            Self::Unrecognized(text) => f.write_str(&single_line(text)),
        }
    }
}

fn parse_record<T: for<'de> Deserialize<'de>>(
    kind: &'static str,
    payload: &str,
) -> Result<T, DecodeError> {
    serde_json::from_str(payload).map_err(|e| DecodeError::MalformedPayload {
        kind,
        reason: e.to_string(),
    })
}

fn parse_hex(field: &'static str, text: &str) -> Result<BigUint, DecodeError> {
    let bytes = hex::decode(text.trim()).map_err(|e| DecodeError::InvalidHex {
        field,
        reason: e.to_string(),
    })?;
    Ok(BigUint::from_bytes_be(&bytes))
}

fn to_hex(value: &BigUint) -> String {
    hex::encode(value.to_bytes_be())
}

fn to_json<T: Serialize>(record: &T) -> Result<String, fmt::Error> {
    serde_json::to_string(record).map_err(|_| fmt::Error)
}

fn control_name(line: &str) -> Option<&str> {
    if line.len() < 2 {
        return None;
    }
    line.strip_prefix(CONTROL_MARK)?.strip_suffix(CONTROL_MARK)
}

// Line breaks inside a free-text field would split the message.
fn single_line(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}
