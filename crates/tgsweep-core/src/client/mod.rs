//! Remote group client abstractions (Telegram MTProto today).

pub mod port;
pub mod throttled;
pub mod types;
