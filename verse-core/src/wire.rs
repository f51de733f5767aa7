//! Device link framing. Each frame is a u32 LE body length followed by the bincode body.

use crate::protocol::Frame;

pub const LEN_SIZE: usize = 4;
/// Device links are small-message transports; anything larger is a bug or garbage.
pub const MAX_FRAME_LEN: u32 = 1024;

#[derive(Debug, thiserror::Error)]
pub enum FrameEncodeError {
    #[error("encode error: {0}")]
    Encode(#[from] bincode::Error),
    #[error("frame body of {0} bytes exceeds limit")]
    TooLarge(usize),
}

#[derive(Debug, thiserror::Error)]
pub enum FrameDecodeError {
    #[error("need more bytes")]
    NeedMore,
    #[error("frame body of {0} bytes exceeds limit")]
    TooLarge(usize),
    #[error("decode error: {0}")]
    Decode(#[from] bincode::Error),
}

pub fn encode_frame(frame: &Frame) -> Result<Vec<u8>, FrameEncodeError> {
    let body = bincode::serialize(frame)?;
    if body.len() > MAX_FRAME_LEN as usize {
        return Err(FrameEncodeError::TooLarge(body.len()));
    }
    let mut out = Vec::with_capacity(LEN_SIZE + body.len());
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend(body);
    Ok(out)
}

/// Body length announced by the header at the front of `bytes`.
fn body_len(bytes: &[u8]) -> Result<usize, FrameDecodeError> {
    let header: [u8; LEN_SIZE] = bytes
        .get(..LEN_SIZE)
        .and_then(|h| h.try_into().ok())
        .ok_or(FrameDecodeError::NeedMore)?;
    let len = u32::from_le_bytes(header) as usize;
    if len > MAX_FRAME_LEN as usize {
        return Err(FrameDecodeError::TooLarge(len));
    }
    Ok(len)
}

/// Decode the frame at the front of `bytes`; returns it with the number of bytes it used.
pub fn decode_frame(bytes: &[u8]) -> Result<(Frame, usize), FrameDecodeError> {
    let total = LEN_SIZE + body_len(bytes)?;
    let body = bytes.get(LEN_SIZE..total).ok_or(FrameDecodeError::NeedMore)?;
    Ok((bincode::deserialize(body)?, total))
}

/// Accumulates stream bytes and yields complete frames in arrival order.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buf: Vec<u8>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Buffered bytes not yet consumed as frames.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Next complete frame, `Ok(None)` while one is still arriving.
    ///
    /// A body that fails to decode is consumed and reported, so the stream stays aligned.
    /// An oversized header is fatal: the caller should drop the connection.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, FrameDecodeError> {
        let total = match body_len(&self.buf) {
            Ok(len) => LEN_SIZE + len,
            Err(FrameDecodeError::NeedMore) => return Ok(None),
            Err(e) => return Err(e),
        };
        if self.buf.len() < total {
            return Ok(None);
        }
        let result = bincode::deserialize(&self.buf[LEN_SIZE..total]);
        self.buf.drain(..total);
        Ok(Some(result?))
    }
}
