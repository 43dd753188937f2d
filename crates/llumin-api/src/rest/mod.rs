// Authenticated REST client for the machine interface.
//
// `client.rs` holds transport mechanics (token attachment, array-shape
// validation, error mapping). Endpoint groups are implemented as inherent
// methods in separate files to keep the client module focused.

pub mod assets;
pub mod client;
pub mod servers;
pub mod tags;

pub use client::RestClient;
