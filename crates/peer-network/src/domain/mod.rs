//! Domain layer: pure logic with no I/O.

pub mod directory;
pub mod entities;
pub mod payload;
pub mod relay;
pub mod sharable;
pub mod value_objects;
pub mod wire;

pub use directory::PeerDirectory;
pub use entities::*;
pub use payload::{Payload, PayloadCodec, TransactionDecoder, TransactionTypeRegistry};
pub use relay::{plan_broadcast, plan_relay, RelayContext, RelayPlan, RelayVerdict};
pub use sharable::is_sharable_ip;
pub use value_objects::*;
pub use wire::{pack_frames, unpack_frames, FrameLayout, WireMessage};
