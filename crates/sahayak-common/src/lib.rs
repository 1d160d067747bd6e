pub mod catalog;
pub mod config;
pub mod inference;
pub mod profile;
