pub mod app;
pub mod clock;
pub mod config;
pub mod context;
pub mod duration;
pub mod error;
pub mod input;
pub mod keystore;
pub mod mode;
pub mod request;
pub mod retry;
pub mod session;
pub mod tool;
pub mod vault;
