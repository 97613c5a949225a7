pub mod ttl_cache;

pub use ttl_cache::{Clock, SystemClock, TtlCache};
