mod commands;
mod output;

pub use commands::{erase, get, signin, store, vault};
pub use output::render_get;
