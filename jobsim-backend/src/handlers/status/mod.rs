pub mod client;
pub mod completed;
pub mod get;
pub mod list;
