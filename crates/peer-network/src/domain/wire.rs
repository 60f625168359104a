//! # Wire Frames
//!
//! A message travels as a *frame set*: an ordered list of byte frames packed
//! into one transport packet.
//!
//! ## Packet body
//!
//! ```text
//! [count: u8] ([len: u32 LE][bytes])*count
//! ```
//!
//! ## Message layouts
//!
//! ```text
//! Direct      [op][hop][payload]                     dialer -> listener
//! FromSender  [sender][op][hop][payload]             listener -> dialer
//! Addressed   [sender][recipient][op][hop][payload]  handed to the endpoint
//! ```
//!
//! `op` is one byte, `hop` is an i32 little-endian, tokens are 16 bytes.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::domain::entities::{MessageOp, NodeId, NODE_ID_LEN};
use crate::errors::WireError;

const MAX_FRAMES: usize = u8::MAX as usize;

/// Pack frames into one packet body.
pub fn pack_frames(frames: &[Bytes]) -> Result<Bytes, WireError> {
    if frames.len() > MAX_FRAMES {
        return Err(WireError::TooManyFrames(frames.len()));
    }
    let size = 1 + frames.iter().map(|f| 4 + f.len()).sum::<usize>();
    let mut buf = BytesMut::with_capacity(size);
    buf.put_u8(frames.len() as u8);
    for frame in frames {
        buf.put_u32_le(frame.len() as u32);
        buf.put_slice(frame);
    }
    Ok(buf.freeze())
}

/// Split a packet body back into frames. Frames share the packet's buffer.
pub fn unpack_frames(mut packet: Bytes) -> Result<Vec<Bytes>, WireError> {
    ensure_remaining(&packet, 1)?;
    let count = packet.get_u8() as usize;
    let mut frames = Vec::with_capacity(count);
    for _ in 0..count {
        ensure_remaining(&packet, 4)?;
        let len = packet.get_u32_le() as usize;
        ensure_remaining(&packet, len)?;
        frames.push(packet.split_to(len));
    }
    if packet.has_remaining() {
        return Err(WireError::TrailingBytes(packet.remaining()));
    }
    Ok(frames)
}

fn ensure_remaining(packet: &Bytes, needed: usize) -> Result<(), WireError> {
    if packet.remaining() < needed {
        return Err(WireError::Truncated {
            needed,
            available: packet.remaining(),
        });
    }
    Ok(())
}

/// Which identity tokens precede the op frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameLayout {
    /// No tokens.
    Direct,
    /// Sender token only.
    FromSender,
    /// Sender then recipient token.
    Addressed,
}

impl FrameLayout {
    fn token_frames(self) -> usize {
        match self {
            Self::Direct => 0,
            Self::FromSender => 1,
            Self::Addressed => 2,
        }
    }

    #[must_use]
    pub fn frame_count(self) -> usize {
        self.token_frames() + 3
    }
}

/// One protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireMessage {
    pub sender: Option<NodeId>,
    pub recipient: Option<NodeId>,
    pub op: MessageOp,
    pub hop_count: i32,
    pub payload: Bytes,
}

impl WireMessage {
    #[must_use]
    pub fn new(op: MessageOp, hop_count: i32, payload: impl Into<Bytes>) -> Self {
        Self {
            sender: None,
            recipient: None,
            op,
            hop_count,
            payload: payload.into(),
        }
    }

    #[must_use]
    pub fn with_sender(mut self, sender: NodeId) -> Self {
        self.sender = Some(sender);
        self
    }

    #[must_use]
    pub fn with_recipient(mut self, recipient: NodeId) -> Self {
        self.recipient = Some(recipient);
        self
    }

    /// Layout implied by the tokens that are set.
    ///
    /// A recipient without a sender is not a valid layout; the recipient is
    /// ignored in that case.
    #[must_use]
    pub fn layout(&self) -> FrameLayout {
        match (self.sender, self.recipient) {
            (Some(_), Some(_)) => FrameLayout::Addressed,
            (Some(_), None) => FrameLayout::FromSender,
            (None, _) => FrameLayout::Direct,
        }
    }

    /// Encode to frames following [`Self::layout`].
    #[must_use]
    pub fn to_frames(&self) -> Vec<Bytes> {
        let mut frames = Vec::with_capacity(self.layout().frame_count());
        if let Some(sender) = self.sender {
            frames.push(Bytes::copy_from_slice(sender.as_bytes()));
            if let Some(recipient) = self.recipient {
                frames.push(Bytes::copy_from_slice(recipient.as_bytes()));
            }
        }
        frames.push(Bytes::copy_from_slice(&[self.op.as_byte()]));
        frames.push(Bytes::copy_from_slice(&self.hop_count.to_le_bytes()));
        frames.push(self.payload.clone());
        frames
    }

    /// Decode frames received with the given layout.
    pub fn from_frames(frames: Vec<Bytes>, layout: FrameLayout) -> Result<Self, WireError> {
        if frames.len() != layout.frame_count() {
            return Err(WireError::FrameCount {
                expected: layout.frame_count(),
                actual: frames.len(),
            });
        }
        let mut frames = frames.into_iter();
        let mut next = || frames.next().unwrap_or_default();

        let sender = match layout {
            FrameLayout::Direct => None,
            _ => Some(parse_token(&next())?),
        };
        let recipient = match layout {
            FrameLayout::Addressed => Some(parse_token(&next())?),
            _ => None,
        };

        let op_frame = next();
        if op_frame.len() != 1 {
            return Err(WireError::BadOperationFrame(op_frame.len()));
        }
        let op = MessageOp::try_from(op_frame[0]).map_err(WireError::UnknownOperation)?;

        let hop_frame = next();
        let hop_bytes: [u8; 4] = hop_frame[..]
            .try_into()
            .map_err(|_| WireError::BadHopCount(hop_frame.len()))?;

        Ok(Self {
            sender,
            recipient,
            op,
            hop_count: i32::from_le_bytes(hop_bytes),
            payload: next(),
        })
    }

    /// Encode straight into a packet body.
    pub fn to_packet(&self) -> Result<Bytes, WireError> {
        pack_frames(&self.to_frames())
    }
}

fn parse_token(frame: &[u8]) -> Result<NodeId, WireError> {
    if frame.len() != NODE_ID_LEN {
        return Err(WireError::BadToken(frame.len()));
    }
    NodeId::from_slice(frame).ok_or(WireError::BadToken(frame.len()))
}
