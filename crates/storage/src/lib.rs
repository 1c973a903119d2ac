mod db;
mod models;
mod reactions;
mod repo;
mod thread;
mod view;

pub use db::Db;
pub use reactions::{ReactionLedger, ReactionSummary};
pub use thread::ThreadStore;
pub use view::ThreadEntry;
