#![warn(
    rust_2024_compatibility,
    clippy::all,
    clippy::future_not_send,
    clippy::mod_module_files,
    clippy::needless_pass_by_ref_mut,
    clippy::unused_async
)]

pub mod cache;
pub mod config;
pub mod error;
pub mod policy;
pub mod proxy;
pub mod token;
pub mod upstream;

#[cfg(test)]
pub(crate) mod testing;
