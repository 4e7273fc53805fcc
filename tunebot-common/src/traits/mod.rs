pub mod chat_traits;
pub mod media_traits;
pub mod repository_traits;
pub mod voice_traits;

pub use chat_traits::ChatGateway;
pub use media_traits::{MediaResolver, ResolvedMedia};
pub use repository_traits::{CarryoverRepository, HistoryRepository};
pub use voice_traits::{OnFinished, VoiceGateway, VoiceHandle};
