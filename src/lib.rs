pub mod config;
pub mod error;
pub mod event;
pub mod feed;
pub mod history;
pub mod input;
pub mod model;
pub mod queue;
pub mod sampler;
pub mod scheduler;
pub mod session;
pub mod stream;
pub mod ui;
