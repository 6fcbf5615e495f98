pub mod admin;
pub mod jobs;
pub mod status;

pub mod utils;
