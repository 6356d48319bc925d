pub mod activity;
pub mod error;
pub mod event;
