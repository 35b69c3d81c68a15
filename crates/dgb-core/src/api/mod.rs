//! Outbound moderation API port and decorators.

mod port;
mod throttled;

pub use port::{DeleteOutcome, ModerationApi};
pub use throttled::{ThrottleConfig, ThrottledApi};
