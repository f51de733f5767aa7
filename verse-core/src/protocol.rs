//! Verse bridge wire protocol: requests, packets, control signals and link frames.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::favorite::Favorite;

/// Current protocol version. Carried by the device handshake.
pub const PROTOCOL_VERSION: u8 = 1;

/// Caller-supplied correlation id. Scopes one request's reply sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Token(pub u32);

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Inbound request from the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    /// Book list for testament 0 (old) or 1 (new).
    ListBooksForTestament { testament: u8 },
    /// Verse batch names ("1-15", "16-30", ...) for one chapter.
    RequestVerseRanges { book: String, chapter: u16 },
    /// Cleaned verse text for a range of one chapter.
    RequestViewerText {
        book: String,
        chapter: u16,
        range: String,
    },
    RequestFavorites,
    ToggleFavorite {
        book: String,
        chapter: u16,
        range: String,
    },
    /// Drop whatever is still queued for the token.
    Cancel,
}

impl Request {
    pub fn kind(&self) -> RequestKind {
        match self {
            Request::ListBooksForTestament { .. } => RequestKind::ListBooksForTestament,
            Request::RequestVerseRanges { .. } => RequestKind::RequestVerseRanges,
            Request::RequestViewerText { .. } => RequestKind::RequestViewerText,
            Request::RequestFavorites => RequestKind::RequestFavorites,
            Request::ToggleFavorite { .. } => RequestKind::ToggleFavorite,
            Request::Cancel => RequestKind::Cancel,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    ListBooksForTestament,
    RequestVerseRanges,
    RequestViewerText,
    RequestFavorites,
    ToggleFavorite,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PacketKind {
    Book,
    VerseBatchName,
    Favorite,
    ViewerContent,
    ControlSignal,
}

/// Failure class reported to the device in an error packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Verse source did not answer in time.
    Timeout,
    /// Verse source unreachable.
    Connection,
    /// Verse source answered with an error status or a body we could not read.
    BadResponse,
    /// Request parameters were invalid (unknown testament, malformed range).
    BadRequest,
    /// A packet exhausted its delivery attempts; the rest of its queue was dropped.
    TransportExhausted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlSignal {
    /// Bridge is ready to receive requests.
    Initialized,
    FavoritesChanged,
    Error { class: ErrorClass, message: String },
}

impl ControlSignal {
    pub fn error(class: ErrorClass, message: impl Into<String>) -> Self {
        ControlSignal::Error {
            class,
            message: message.into(),
        }
    }
}

/// Packet body. Each variant maps to exactly one [`PacketKind`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Payload {
    Book { name: String, chapters: u16 },
    VerseBatchName { range: String },
    /// `None` is the single "no favorites" packet.
    Favorite(Option<Favorite>),
    ViewerContent { content: String },
    Control(ControlSignal),
}

impl Payload {
    pub fn kind(&self) -> PacketKind {
        match self {
            Payload::Book { .. } => PacketKind::Book,
            Payload::VerseBatchName { .. } => PacketKind::VerseBatchName,
            Payload::Favorite(_) => PacketKind::Favorite,
            Payload::ViewerContent { .. } => PacketKind::ViewerContent,
            Payload::Control(_) => PacketKind::ControlSignal,
        }
    }
}

/// Atomic unit ready for transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    /// `None` only for packets outside any token's queue (startup signal).
    pub token: Option<Token>,
    /// Zero-based position within the packet's queue.
    pub index: u32,
    pub payload: Payload,
}

impl Packet {
    pub fn kind(&self) -> PacketKind {
        self.payload.kind()
    }
}

/// Everything exchanged on the device link. Encoding is bincode; framing is length-prefix (see wire module).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frame {
    /// Device -> bridge request.
    Request { token: Token, request: Request },
    /// Bridge -> device packet, acknowledged by `Ack` or `Nack` with the same transaction id.
    Packet { transaction_id: u32, packet: Packet },
    Ack { transaction_id: u32 },
    Nack { transaction_id: u32, reason: String },
}
