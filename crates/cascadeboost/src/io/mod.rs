//! Model serialization.
//!
//! The native format stores a [`Cascade`](crate::repr::Cascade) behind a
//! checksummed envelope. See [`native`] for the byte layout.

pub mod native;

pub use native::{
    CURRENT_VERSION_MAJOR, CURRENT_VERSION_MINOR, DeserializeError, FormatHeader, HEADER_SIZE, MAGIC, NativeCodec,
    SerializeError, read_cascade_file, write_cascade_file,
};
pub use crate::repr::MAX_TREE_DEPTH;
