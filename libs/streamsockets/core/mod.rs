pub mod config;
pub mod connection;
pub mod connection_state;
pub mod protocol;

pub use config::{StreamConfig, PRODUCTION_URL, TESTNET_URL};
pub use connection::{Metrics, SlotReservation, StreamConnection};
pub use connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState};
pub use protocol::{Inbound, Method, StreamRequest};
