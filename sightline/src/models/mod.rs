//! Data models for sightline entities.

mod detection;
mod message;
mod session;

pub use detection::{Detection, OrientedBox};
pub use message::{Message, MessageRole};
pub use session::{ImageState, RemoteImage, Session, DEFAULT_TITLE};
