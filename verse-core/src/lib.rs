//! Verse bridge reference implementation.
//! Host-driven: no I/O; host passes events (with the current time) and receives actions.

pub mod bible;
pub mod bridge;
pub mod chunk;
pub mod clean;
pub mod config;
pub mod favorite;
pub mod protocol;
pub mod queue;
pub mod registry;
pub mod verse;
pub mod wire;

pub use bridge::{Bridge, BridgeAction, FetchId};
pub use config::{Config, DeliveryPolicy};
pub use favorite::{Favorite, FavoriteList, FavoriteStore, MemoryStore, StoreError};
pub use protocol::{
    ControlSignal, ErrorClass, Frame, Packet, PacketKind, Payload, Request, RequestKind, Token,
    PROTOCOL_VERSION,
};
pub use queue::SendId;
pub use registry::{QueueRegistry, SendOutcome};
pub use verse::{FetchError, Verse};
pub use wire::{decode_frame, encode_frame, FrameBuffer, FrameDecodeError, FrameEncodeError};
