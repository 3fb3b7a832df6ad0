//! Gambit Runtime
//!
//! The running parts of the Gambit relay:
//! - `SessionRelay`: per-connection protocol handler over the room store
//! - `ConnectionHub`: in-process `Transport` routing events to connections and room groups
//! - `ReaperTask`: periodic eviction of expired rooms
//! - `RelayBuilder`/`RelayHandle`: wiring and lifecycle
//!
//! Network adapters (the WebSocket listener in `gambit-server`) register
//! connections with the hub and feed decoded frames to the relay.

pub mod builder;
pub mod reaper;
pub mod relay;
pub mod transport;

pub use builder::{RelayBuilder, RelayHandle};
pub use reaper::ReaperTask;
pub use relay::{ConnectionSession, SessionRelay, SessionState};
pub use transport::{ConnectionHub, EventReceiver, EventSender, Transport};

// Re-export core types for convenience
pub use gambit_core::{
    ClientEvent, ConnectionId, GambitError, GambitResult, RelayConfig, RoomId, RoomStore,
    RulesEngine, ServerEvent,
};
