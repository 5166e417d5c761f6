pub mod message;
pub mod socket;

pub use message::BroadcastMessage;
