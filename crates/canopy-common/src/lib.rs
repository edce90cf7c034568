pub mod error;
pub mod ids;
pub mod time;

pub use error::{CanopyError, Error, FromMessage, Result};
