//! Length-prefixed control-channel framing.
//!
//! A frame is an ASCII decimal length, a single `\n` separator and then
//! exactly that many bytes of payload. The length excludes the separator.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// The longest length prefix we accept, in digits.
pub const MAX_PREFIX_DIGITS: usize = 7;

/// The largest payload expressible with [`MAX_PREFIX_DIGITS`].
pub const MAX_PAYLOAD_LEN: usize = 9_999_999;

const SEPARATOR: u8 = b'\n';

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid byte {0:#04x} in frame length prefix")]
    InvalidPrefix(u8),

    #[error("frame length prefix is empty")]
    EmptyPrefix,

    #[error("frame length prefix exceeds {MAX_PREFIX_DIGITS} digits")]
    PrefixTooLong,

    #[error("frame payload of {0} bytes exceeds the maximum of {MAX_PAYLOAD_LEN}")]
    PayloadTooLarge(usize),

    #[error("premature end of stream after {read} of {expected} frame bytes")]
    PrematureEof { read: usize, expected: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Reads one complete frame, returning its payload.
pub async fn read_frame<R>(channel: &mut R) -> Result<Vec<u8>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let len = read_prefix(channel).await?;

    let mut payload = vec![0; len];
    let mut filled = 0;
    while filled < len {
        match channel.read(&mut payload[filled..]).await? {
            0 => {
                return Err(FrameError::PrematureEof {
                    read: filled,
                    expected: len,
                })
            }
            n => filled += n,
        }
    }

    tracing::trace!(len, "read frame");
    Ok(payload)
}

async fn read_prefix<R>(channel: &mut R) -> Result<usize, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut len = 0usize;
    let mut digits = 0usize;
    loop {
        let mut byte = [0u8; 1];
        if channel.read(&mut byte).await? == 0 {
            return Err(FrameError::PrematureEof {
                read: digits,
                expected: digits + 1,
            });
        }

        match byte[0] {
            SEPARATOR if digits == 0 => return Err(FrameError::EmptyPrefix),
            SEPARATOR => return Ok(len),
            b @ b'0'..=b'9' => {
                if digits == MAX_PREFIX_DIGITS {
                    return Err(FrameError::PrefixTooLong);
                }
                digits += 1;
                len = len * 10 + usize::from(b - b'0');
            }
            b => return Err(FrameError::InvalidPrefix(b)),
        }
    }
}

/// Writes `payload` as a single frame and flushes the channel.
///
/// The prefix, separator and payload are assembled into one buffer so that a
/// reader never observes a prefix without its payload following.
pub async fn write_frame<W>(channel: &mut W, payload: &[u8]) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    let buf = encode(payload)?;
    channel.write_all(&buf).await?;
    channel.flush().await?;
    tracing::trace!(len = payload.len(), "wrote frame");
    Ok(())
}

/// Encodes `payload` into its framed representation.
pub fn encode(payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(FrameError::PayloadTooLarge(payload.len()));
    }

    let prefix = payload.len().to_string();
    let mut buf = Vec::with_capacity(prefix.len() + 1 + payload.len());
    buf.extend_from_slice(prefix.as_bytes());
    buf.push(SEPARATOR);
    buf.extend_from_slice(payload);
    Ok(buf)
}
