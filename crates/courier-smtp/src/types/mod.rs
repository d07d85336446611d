//! Core SMTP types.

mod capability;
mod reply;

pub use capability::Capabilities;
pub use reply::{Reply, ReplyCode};
