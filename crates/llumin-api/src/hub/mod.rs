// Realtime hub channel
//
// `protocol.rs` defines the wire framing for the classic hub protocol;
// `channel.rs` owns the connection state machine, reconnection, control
// dispatch, and the outbound value-push path.

pub mod channel;
pub mod protocol;

pub use channel::{ChannelState, HubChannel, HubConfig, HubEvent, PushOutcome, ReconnectConfig};
pub use protocol::TagValueUpdate;
