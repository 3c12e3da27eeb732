pub mod id;
pub mod message;
pub mod position;

pub use id::SessionId;
pub use message::OutgoingMessage;
pub use position::{GeoInput, Position, UNKNOWN_REGION};
