pub mod comments;
pub mod reactions;
pub mod sessions;
pub mod sse;
