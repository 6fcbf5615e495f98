pub mod cancel;
pub mod create;
