pub mod queue;
pub mod session;

pub use queue::{PlaybackQueue, QueueSlot, QUEUE_VIEW_LIMIT};
pub use session::{
    abandons_bot, PlaybackCommand, PlaybackService, SessionSettings, SessionSnapshot, SkipOutcome,
    AUTO_LEAVE_NOTICE,
};
