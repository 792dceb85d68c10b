pub mod pool;
pub mod template;

pub use pool::{StreamPoolManager, StreamSubscription};
pub use template::expand_template;
