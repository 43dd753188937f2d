// llumin-api: Async Rust client for the LLumin machine interface (REST + realtime hub)

pub mod error;
pub mod hub;
pub mod models;
pub mod rest;
pub mod token;
pub mod transport;

pub use error::Error;
pub use hub::{ChannelState, HubChannel, HubConfig, HubEvent, PushOutcome, ReconnectConfig};
pub use rest::RestClient;
pub use token::TokenManager;
