// channel-core/src/lib.rs
// Kanal-Erkennung aus Pivot-Strömen: Core Library Definitions

pub mod channel;
pub mod config;
pub mod errors;

pub use channel::{ChannelDetector, ChannelRegistry, DetectorSnapshot, Line, LineKind, PairKey};
pub use config::{ChannelConfig, ChannelSettings};
pub use errors::{ChannelError, ChannelResult};

// Re-export channel-common for convenience
pub use channel_common::data;
