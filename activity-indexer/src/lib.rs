pub mod helpers;
pub mod interfaces;
pub mod services;
