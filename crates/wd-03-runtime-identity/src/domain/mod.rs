pub mod handshake;
pub mod types;

pub use handshake::*;
pub use types::*;
