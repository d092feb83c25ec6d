pub mod commands;
pub mod manager;
pub mod view;

use parking_lot::Mutex;
use std::sync::Arc;

pub use manager::{Mode, ModeKind, PhotoState, RequestId, Session};
pub use view::SessionView;

pub type SessionState = Arc<Mutex<Session>>;
