use std::net::Ipv4Addr;

use crate::error::{FrameError, TransportError};

/// Separates the sender's address from the logical payload.
pub const DELIMITER: &str = "$$$";
/// Largest encoded datagram the transport will send.
pub const MAX_FRAME_BYTES: usize = 1024 * 10 - 512;
/// The delimiter must start within the first 16 bytes (`255.255.255.255`
/// plus one).
const MAX_DELIMITER_INDEX: usize = 16;

/// One inbound datagram with its sender tag stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub sender: Ipv4Addr,
    pub payload: String,
}

/// Prefixes `payload` with the sender tag.
///
/// # Errors
///
/// Returns [`TransportError::Oversized`] when the encoded frame would exceed
/// [`MAX_FRAME_BYTES`].
pub fn encode_frame(sender: Ipv4Addr, payload: &str) -> Result<String, TransportError> {
    let frame = format!("{}{}{}", sender, DELIMITER, payload);
    if frame.len() > MAX_FRAME_BYTES {
        return Err(TransportError::Oversized {
            len: frame.len(),
            max: MAX_FRAME_BYTES,
        });
    }
    Ok(frame)
}

/// Splits a received datagram into sender and payload.
///
/// # Errors
///
/// Returns an error when the datagram is not UTF-8, the delimiter is missing
/// or misplaced, or the sender tag is not an IPv4 address.
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, FrameError> {
    let text = std::str::from_utf8(bytes).map_err(|_utf8| FrameError::NotUtf8)?;
    let index = text.find(DELIMITER).ok_or(FrameError::MissingDelimiter)?;
    if index >= MAX_DELIMITER_INDEX {
        return Err(FrameError::MisplacedDelimiter { index });
    }
    let (sender, rest) = text.split_at(index);
    let payload = rest.get(DELIMITER.len()..).unwrap_or_default();
    let sender = sender
        .trim()
        .parse::<Ipv4Addr>()
        .map_err(|_parse| FrameError::InvalidSender {
            value: sender.to_owned(),
        })?;
    Ok(Frame {
        sender,
        payload: payload.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, AppResult};

    #[test]
    fn encoded_frame_decodes_to_same_parts() -> AppResult<()> {
        let sender = Ipv4Addr::new(10, 0, 0, 5);
        let encoded = encode_frame(sender, "Hrun")?;
        if encoded != "10.0.0.5$$$Hrun" {
            return Err(AppError::validation(format!("encoded {}", encoded)));
        }
        let frame = decode_frame(encoded.as_bytes())?;
        if frame.sender != sender || frame.payload != "Hrun" {
            return Err(AppError::validation(format!("decoded {:?}", frame)));
        }
        Ok(())
    }

    #[test]
    fn payload_may_contain_delimiter() -> AppResult<()> {
        let frame = decode_frame(b"10.0.0.1$$$Ma$$$b")?;
        if frame.payload != "Ma$$$b" {
            return Err(AppError::validation(format!("payload {}", frame.payload)));
        }
        Ok(())
    }

    #[test]
    fn malformed_frames_are_rejected() -> AppResult<()> {
        let cases: [(&[u8], FrameError); 4] = [
            (b"10.0.0.1 Hidle", FrameError::MissingDelimiter),
            (
                b"0000000000000010.0.0.1$$$Hidle",
                FrameError::MisplacedDelimiter { index: 22 },
            ),
            (
                b"host$$$Hidle",
                FrameError::InvalidSender {
                    value: "host".to_owned(),
                },
            ),
            (&[0xff, 0xfe, b'$', b'$', b'$'], FrameError::NotUtf8),
        ];
        for (bytes, expected) in cases {
            match decode_frame(bytes) {
                Err(err) if err == expected => {}
                other => {
                    return Err(AppError::validation(format!(
                        "expected {:?}, got {:?}",
                        expected, other
                    )));
                }
            }
        }
        Ok(())
    }

    #[test]
    fn oversized_payload_is_refused() -> AppResult<()> {
        let payload = "x".repeat(MAX_FRAME_BYTES);
        match encode_frame(Ipv4Addr::LOCALHOST, &payload) {
            Err(TransportError::Oversized { max, .. }) if max == MAX_FRAME_BYTES => Ok(()),
            other => Err(AppError::validation(format!("unexpected {:?}", other))),
        }
    }
}
