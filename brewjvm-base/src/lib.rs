#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]
// This would be nice to re-enable eventually, but not while in active dev
#![allow(clippy::missing_errors_doc)]
// Shadowing is nice.
#![allow(clippy::shadow_unrelated)]
// Not awful, but it highlights entire function.
#![allow(clippy::unnecessary_wraps)]
// Cool idea but highlights entire function and is too aggressive.
#![allow(clippy::option_if_let_else)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::semicolon_if_nothing_returned)]
#![allow(clippy::enum_variant_names)]
#![allow(clippy::too_many_lines)]

use constant_pool::ConstantPoolError;
use descriptor::DescriptorError;

pub mod attribute;
pub mod class;
pub mod code;
pub mod constant_pool;
pub mod descriptor;
pub mod print;
pub mod reader;
pub mod util;
pub mod writer;

pub use class::ClassFile;

/// The magic number every class file starts with
pub const CLASS_MAGIC: u32 = 0xCAFE_BABE;

#[derive(Debug, Clone)]
pub struct ParseConfig {
    /// Whether the magic number must be [`CLASS_MAGIC`].
    /// If this is false then any four bytes are accepted.
    pub verify_magic: bool,
}
impl ParseConfig {
    #[must_use]
    pub fn new() -> ParseConfig {
        ParseConfig { verify_magic: true }
    }
}
impl Default for ParseConfig {
    fn default() -> Self {
        Self::new()
    }
}

// Note: Currently all of these errors use non_exhaustive, but in the future that may be removed
// on some if there is a belief that they are likely to be stable.

#[derive(Debug)]
#[non_exhaustive]
pub enum ClassFileParseError {
    /// The underlying source failed for a reason other than running out of data
    Io(std::io::Error),
    /// The source ran out of data before a structure was complete
    Truncated {
        /// Offset into the source where the read began
        position: usize,
        needed: usize,
        had: usize,
    },
    BadMagic(u32),
    /// A constant pool entry had a tag that is not any known constant kind
    UnknownConstantTag {
        /// The slot that the entry would have occupied
        index: u16,
        tag: u8,
    },
    /// The bytes of a utf8 constant were not valid modified-utf8
    InvalidText {
        index: u16,
    },
    ConstantPool(ConstantPoolError),
    Descriptor(DescriptorError),
    /// A specially decoded attribute did not use exactly the bytes it declared
    AttributeLengthMismatch {
        name: &'static str,
        declared: u32,
        used: u32,
    },
    /// Code arrays must be less than 65536 bytes
    CodeTooLong(u32),
}
impl From<ConstantPoolError> for ClassFileParseError {
    fn from(err: ConstantPoolError) -> Self {
        Self::ConstantPool(err)
    }
}
impl From<DescriptorError> for ClassFileParseError {
    fn from(err: DescriptorError) -> Self {
        Self::Descriptor(err)
    }
}
