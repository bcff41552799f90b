//! Value types, binary io, and the error taxonomy of the vidtiles engine.

pub mod error;
pub use error::*;
pub mod io;
pub mod types;
pub use types::*;
