//! Binary reading and writing for the catalog's serialized descriptors.
//!
//! The layout descriptor on disk is a little varint record, so the traits here
//! only carry the integer/varint surface that format needs.

mod value_reader;
pub use value_reader::*;

mod value_writer;
pub use value_writer::*;
