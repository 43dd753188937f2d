// llumin-core: Bridge layer between a local automation pipeline and the
// LLumin machine interface.

pub mod bridge;
pub mod cache;
pub mod config;
pub mod convert;
pub mod error;
pub mod events;
pub mod model;

// ── Primary re-exports ──────────────────────────────────────────────
pub use bridge::Bridge;
pub use cache::TagCache;
pub use config::{BridgeConfig, DEFAULT_SERVICE_NAME, TlsVerification};
pub use error::CoreError;
pub use events::BridgeEvent;
pub use model::{Asset, RemoteServer, Sample, Tag, UpdateOutcome};

// Channel state is part of the consumer-facing surface: a host status
// reporter observes it through `Bridge::watch_channel`.
pub use llumin_api::hub::ChannelState;
