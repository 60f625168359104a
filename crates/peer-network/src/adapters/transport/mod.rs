//! TCP transport: packet codec, inbound endpoint, outbound connections.

pub mod codec;
pub mod dialer;
pub mod listener;

pub use codec::{PacketReader, PacketWriter};
pub use dialer::{parse_connection_address, OutboundConnection};
pub use listener::{InboundEndpoint, InboundFrames};

use tokio::sync::watch;

/// Resolves once `flag` is `true` or its sender is gone.
pub(crate) async fn wait_until_set(mut flag: watch::Receiver<bool>) {
    while !*flag.borrow_and_update() {
        if flag.changed().await.is_err() {
            return;
        }
    }
}
