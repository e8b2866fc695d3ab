//! The MRGA session core: playback, streamed recommendations and the paged
//! station list, each guarded by resource tokens.

pub mod catalog;
pub mod chat;
pub mod filter;
pub mod loader;
pub mod matcher;
pub mod playback;
pub mod reveal;
pub mod session;
pub mod token;
pub mod transport;

pub use catalog::CatalogClient;
pub use chat::{ChatConsumer, ChatUpdate};
pub use loader::ListLoader;
pub use playback::{DeviceReporter, PlaybackController, PlaybackDevice, PlaybackState};
pub use session::{SessionCore, SessionEvent, SessionOptions, SessionSnapshot, SessionUpdate};
pub use transport::{ChatTransport, HttpChatTransport};
