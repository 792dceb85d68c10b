pub mod error;
pub mod handler;
pub mod reconnect;

pub use error::{Result, StreamError};
pub use handler::{ChannelHandler, HandlerId};
pub use reconnect::{FixedDelay, ReconnectionStrategy};
