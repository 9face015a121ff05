//! Binary codec for AMQP field data.
//!
//! The codec is layered:
//!
//! - [`scalar`]: bounds-checked big-endian integers, floats and byte runs.
//! - [`table`]: the self-describing field value format with its nested tables
//!   and arrays.
//! - [`args`]: method-argument fields, including packed bits and short/long
//!   strings.
//!
//! Every decoder reports [`MalformedData`](crate::error::MalformedData) on bad
//! input; none of them panics on untrusted bytes.

pub mod args;
pub mod scalar;
pub mod table;

pub use args::{ArgField, ArgReader, ArgWriter, LongString, ShortString};
pub use scalar::{WireReader, WireWriter};
pub use table::{
    Array,
    Decimal,
    FieldKind,
    FieldValue,
    MAX_NESTING,
    Table,
    TableEntry,
    compare_keys,
};
