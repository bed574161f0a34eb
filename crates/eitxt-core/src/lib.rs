pub mod config;
pub mod error;
pub mod types;

pub use error::{EitxtError, EitxtResult, EnvelopeError, ErrorKind};
pub use types::{Compression, EncryptOptions};
