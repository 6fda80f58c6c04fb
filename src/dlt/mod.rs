//! The DLT log-format model: frame decoding, file access, filters.

pub mod file;
pub mod filter;
pub mod message;

#[cfg(test)]
pub mod testframe;

pub use file::{DltFileSet, LogFile};
pub use filter::{DefaultFilterStore, DltFilter, DltFilterList, FilterIndex, FilterKind};
pub use message::{DltMessage, Endianness, MessageType};
