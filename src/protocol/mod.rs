//! 와이어 프로토콜

pub mod messages;

pub use messages::*;
