#![forbid(unsafe_code)]
#![warn(
    clippy::pedantic,
    clippy::must_use_candidate,
    clippy::empty_enum,
    clippy::unwrap_used
)]
#![allow(
    clippy::new_without_default,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions
)]

mod deserializers;

pub mod close_code;
pub mod envelope;
pub mod opcode;
pub mod payload;

pub use self::close_code::{CloseCode, ClosePolicy};
pub use self::envelope::{decode_envelope, encode_envelope};
pub use self::opcode::OpCode;

/// Voice gateway API version spoken by `voicewire`.
pub const API_VERSION: u8 = 4;

/// Length of the per-session media encryption key.
pub const SECRET_KEY_LEN: usize = 32;
