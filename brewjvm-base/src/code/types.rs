//! Operand types of instructions, and how they are read out of the code array.
use crate::{constant_pool::ConstantPoolIndexRaw, util::StaticMemorySize};

/// Internal
pub trait ParseOutput {
    type Output;
    fn parse(d: &[u8]) -> Self::Output;
}
macro_rules! create_primitive_types {
    ([
        $($name:ident = $mem_size:expr; $d:ident -> $parse_t:ty $parse:block),* $(,)*
    ]) => {
        $(
            /// Internal
            #[derive(Debug, Clone, Copy)]
            pub struct $name;
            impl ParseOutput for $name {
                type Output = $parse_t;
                /// Param Assured to be the same size as [`Self::MEMORY_SIZE`]
                fn parse($d: &[u8]) -> $parse_t {
                    $parse
                }
            }
            impl StaticMemorySize for $name {
                const MEMORY_SIZE: usize = $mem_size;
            }
        )*
    };
}
create_primitive_types!([
    Byte = 1; d -> i8 { i8::from_be_bytes([d[0]]) },
    UnsignedByte = 1; d -> u8 { d[0] },
    Short = 2; d -> i16 { i16::from_be_bytes([d[0], d[1]]) },
    UnsignedShort = 2; d -> u16 { u16::from_be_bytes([d[0], d[1]]) },
]);

impl<T> ParseOutput for ConstantPoolIndexRaw<T> {
    type Output = ConstantPoolIndexRaw<T>;
    fn parse(d: &[u8]) -> Self::Output {
        let v = u16::from_be_bytes([d[0], d[1]]);
        ConstantPoolIndexRaw::new(v)
    }
}
impl<T> StaticMemorySize for ConstantPoolIndexRaw<T> {
    const MEMORY_SIZE: usize = 2;
}

pub type LocalVariableIndexByte = UnsignedByte;
/// A branch offset, relative to the address of the branching instruction
pub type BranchOffset = Short;
