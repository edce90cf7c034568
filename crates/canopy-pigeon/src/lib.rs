pub mod client;
pub mod error;
pub mod server;
pub mod wire;
#[cfg(test)]
mod wire_tests;

pub use client::PigeonClient;
pub use error::{Error, Result};
pub use server::{HandlerFn, HandlerFuture, PigeonServer, PrefixHandlerFn};
pub use wire::{PigeonRequest, PigeonResponse};

pub const DEFAULT_PORT: u16 = 1888;
