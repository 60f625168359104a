//! Packet framing over TCP and the identity greeting.
//!
//! Each frame set is one length-delimited packet. The first packet on every
//! connection is the greeting: a frame set holding the dialer's 16-byte
//! identity token.

use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};

use crate::domain::{pack_frames, unpack_frames, NodeId};
use crate::errors::{TransportError, WireError};

pub type PacketReader = FramedRead<OwnedReadHalf, LengthDelimitedCodec>;
pub type PacketWriter = FramedWrite<OwnedWriteHalf, LengthDelimitedCodec>;

#[must_use]
pub fn packet_codec(max_packet_size: usize) -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .max_frame_length(max_packet_size)
        .new_codec()
}

/// Split a TCP stream into framed halves.
#[must_use]
pub fn framed_halves(stream: tokio::net::TcpStream, max_packet_size: usize) -> (PacketReader, PacketWriter) {
    let (read, write) = stream.into_split();
    (
        FramedRead::new(read, packet_codec(max_packet_size)),
        FramedWrite::new(write, packet_codec(max_packet_size)),
    )
}

pub async fn write_greeting(writer: &mut PacketWriter, id: NodeId) -> Result<(), TransportError> {
    let packet = pack_frames(&[Bytes::copy_from_slice(id.as_bytes())])?;
    writer.send(packet).await?;
    Ok(())
}

pub async fn read_greeting(reader: &mut PacketReader, within: Duration) -> Result<NodeId, TransportError> {
    let packet = tokio::time::timeout(within, reader.next())
        .await
        .map_err(|_| TransportError::Timeout("greeting"))?
        .ok_or(TransportError::Closed)??;
    let frames = unpack_frames(packet.freeze())?;
    match frames.as_slice() {
        [token] => NodeId::from_slice(token)
            .ok_or_else(|| TransportError::Wire(WireError::BadToken(token.len()))),
        other => Err(TransportError::Wire(WireError::FrameCount {
            expected: 1,
            actual: other.len(),
        })),
    }
}
