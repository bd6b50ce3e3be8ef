pub mod framing;
pub mod keyvalue;
pub mod types;

pub use framing::{LineBuffer, LineFramed, LineReader, LineWriter, Terminator};
pub use keyvalue::KeyValueFile;
pub use types::{BoundedLog, LOG_CAPACITY, LogEntry, NICK_PALETTE_SIZE, Tone};
