pub mod handle;
pub mod media;
pub mod models;
pub mod store;

pub use handle::SessionHandle;
pub use media::{MediaPersistence, MediaPolicy, MediaStore};
pub use models::{AI_AUTHOR, ComposeError, Media, Message, RequestId, Session};
pub use store::{LoadStatus, SessionLoadError, SessionStore};
