//! Request middleware for the worker router.

pub mod access_log;

pub use access_log::access_log;
