pub mod listener;
pub mod normalizer;
