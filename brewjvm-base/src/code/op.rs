use crate::code::op_ex::InstructionParseError;
use crate::code::types::{
    BranchOffset, Byte, LocalVariableIndexByte, ParseOutput, Short, UnsignedByte,
};
use crate::code::InstructionIndex;
use crate::constant_pool::{ConstantInfo, ConstantPoolIndexRaw};
use crate::util::{MemorySize, StaticMemorySize};

pub type RawOpcode = u8;

macro_rules! define_instruction {
    ($(#[$name_outer:meta])*
    $name: ident: {
        opcode: $opcode:expr,
        args: [$(
            $(#[$arg_outer:meta])*
            $arg:ident : $arg_ty:ty
        ),* $(,)*],
    }) => {
        $(#[$name_outer])*
        #[derive(Debug, Clone)]
        pub struct $name {
            $(
                $(#[$arg_outer])*
                pub $arg : <$arg_ty as ParseOutput>::Output,
            )*
        }
        impl $name {
            pub const OPCODE: RawOpcode = $opcode;

            #[allow(unused_variables, unused_mut, unused_assignments)]
            pub(crate) fn parse(data: &[u8], idx: InstructionIndex) -> Result<$name, InstructionParseError> {
                let data = &data[usize::from(idx.0)..];
                let needed_size: usize = $name::MEMORY_SIZE;
                if data.len() < needed_size {
                    return Err(InstructionParseError::NotEnoughData {
                        opcode: Self::OPCODE,
                        needed: needed_size,
                        had: data.len(),
                    });
                }

                // Skip over the opcode
                let mut idx = 1;
                $(
                    let size = <$arg_ty>::MEMORY_SIZE;
                    let $arg = <$arg_ty>::parse(&data[idx..(idx + size)]);
                    idx += size;
                )*
                Ok(Self {
                    $(
                        $arg,
                    )*
                })
            }
        }
        // The size of themselves in the code
        impl StaticMemorySize for $name {
            const MEMORY_SIZE: usize = 1 + $(<$arg_ty>::MEMORY_SIZE +)* 0;
        }
    };
}

/// Define the instructions (opcodes)
/// Note: the opcode expr should be a simple number that can be used in a match expression.
/// The leading `$` is passed through so that the nested `map_inst` macro can declare its own
/// metavariables.
macro_rules! define_instructions {
    ($d:tt [$(
        $(#[$name_outer:meta])*
        $name:ident : {$($data:tt)*},
    )+]) => {
        $(
            define_instruction!(
                $(#[$name_outer])*
                $name : {$($data)*}
            );
        )+

        #[allow(dead_code)]
        fn check_instruction_duplicates() {
            let info: &[(&str, RawOpcode)] = &[
                $(
                    (stringify!($name), $name::OPCODE)
                ),+
            ];

            for (li, (ls, lo)) in info.iter().enumerate() {
                for (ri, (rs, ro)) in info.iter().enumerate() {
                    if li == ri {
                        continue;
                    }

                    if rs == ls {
                        panic!("Duplicate opcode name!: '{}'", ls);
                    }

                    if lo == ro {
                        panic!("Duplicate opcode!: '{}' and '{}' with {}", ls, rs, lo);
                    }
                }
            }
        }

        #[derive(Clone)]
        pub enum Inst {
            $(
                $name ($name)
            ),+
        }
        impl Inst {
            pub fn parse(code: &[u8], idx: InstructionIndex) -> Result<Inst, InstructionParseError> {
                let opcode: RawOpcode = code
                    .get(usize::from(idx.0)).copied()
                    .ok_or(InstructionParseError::ExpectedOpCodeAt(idx))?;
                match opcode {
                    $(
                        $name::OPCODE => {
                            Ok(Inst::$name($name::parse(code, idx)?))
                        }
                    )+
                    _ => Err(InstructionParseError::UnknownOpcode {
                        idx,
                        opcode,
                    })
                }
            }

            #[must_use]
            pub fn opcode(&self) -> RawOpcode {
                match self {
                    $(
                        Inst::$name(_) => $name::OPCODE,
                    )+
                }
            }

            #[must_use]
            pub fn name(&self) -> &'static str {
                match self {
                    $(
                        Inst::$name(_) => stringify!($name),
                    )+
                }
            }
        }
        impl MemorySize for Inst {
            fn memory_size(&self) -> usize {
                match self {
                    $(
                        Inst::$name(v) => v.memory_size(),
                    )*
                }
            }
        }
        // Custom formatting to only print the struct, which is nicer to see
        impl std::fmt::Debug for Inst {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        Inst::$name(v) => std::fmt::Debug::fmt(v, f),
                    )*
                }
            }
        }

        /// Evaluate `$body` with `$x` bound to the specific instruction held by the [`Inst`]
        #[macro_export]
        macro_rules! map_inst {
            ($d inst:expr; $d x:ident; $d body:expr) => {
                match $d inst {
                    $(
                        $crate::code::op::Inst::$name($d x) => $d body,
                    )+
                }
            };
        }
    };
}

define_instructions! {$ [
    /// Do nothing
    Nop: {
        opcode: 0x0,
        args: [],
    },
    /// Pushes null to the stack
    AConstNull: {
        opcode: 0x1,
        args: [],
    },
    IConstNeg1: {
        opcode: 0x2,
        args: [],
    },
    IntConst0: {
        opcode: 0x3,
        args: [],
    },
    IntConst1: {
        opcode: 0x4,
        args: [],
    },
    IntConst2: {
        opcode: 0x5,
        args: [],
    },
    IntConst3: {
        opcode: 0x6,
        args: [],
    },
    IntConst4: {
        opcode: 0x7,
        args: [],
    },
    IntConst5: {
        opcode: 0x8,
        args: [],
    },
    LongConst0: {
        opcode: 0x9,
        args: [],
    },
    LongConst1: {
        opcode: 0xA,
        args: [],
    },
    FloatConst0: {
        opcode: 0xB,
        args: [],
    },
    FloatConst1: {
        opcode: 0xC,
        args: [],
    },
    FloatConst2: {
        opcode: 0xD,
        args: [],
    },
    DoubleConst0: {
        opcode: 0xE,
        args: [],
    },
    DoubleConst1: {
        opcode: 0xF,
        args: [],
    },
    /// Push a byte, sign extended to an int
    PushByte: {
        opcode: 0x10,
        args: [
            val: Byte,
        ],
    },
    /// Push a short, sign extended to an int
    PushShort: {
        opcode: 0x11,
        args: [
            val: Short,
        ],
    },
    /// Push a single-slot constant (int or float) from the constant pool
    LoadConstant: {
        opcode: 0x12,
        args: [
            /// Index into the constant pool, limited to a single byte
            index: UnsignedByte,
        ],
    },
    /// Same as [`LoadConstant`] but with a two byte index
    LoadConstantWide: {
        opcode: 0x13,
        args: [
            index: ConstantPoolIndexRaw<ConstantInfo>,
        ],
    },
    /// Push a long or double from the constant pool
    LoadConstant2Wide: {
        opcode: 0x14,
        args: [
            index: ConstantPoolIndexRaw<ConstantInfo>,
        ],
    },

    IntLoad: {
        opcode: 0x15,
        args: [
            /// Index into the local variable array of the current frame
            index: LocalVariableIndexByte,
        ],
    },
    LongLoad: {
        opcode: 0x16,
        args: [
            index: LocalVariableIndexByte,
        ],
    },
    FloatLoad: {
        opcode: 0x17,
        args: [
            index: LocalVariableIndexByte,
        ],
    },
    DoubleLoad: {
        opcode: 0x18,
        args: [
            index: LocalVariableIndexByte,
        ],
    },
    IntLoad0: {
        opcode: 0x1A,
        args: [],
    },
    IntLoad1: {
        opcode: 0x1B,
        args: [],
    },
    IntLoad2: {
        opcode: 0x1C,
        args: [],
    },
    IntLoad3: {
        opcode: 0x1D,
        args: [],
    },
    LongLoad0: {
        opcode: 0x1E,
        args: [],
    },
    LongLoad1: {
        opcode: 0x1F,
        args: [],
    },
    LongLoad2: {
        opcode: 0x20,
        args: [],
    },
    LongLoad3: {
        opcode: 0x21,
        args: [],
    },
    FloatLoad0: {
        opcode: 0x22,
        args: [],
    },
    FloatLoad1: {
        opcode: 0x23,
        args: [],
    },
    FloatLoad2: {
        opcode: 0x24,
        args: [],
    },
    FloatLoad3: {
        opcode: 0x25,
        args: [],
    },
    DoubleLoad0: {
        opcode: 0x26,
        args: [],
    },
    DoubleLoad1: {
        opcode: 0x27,
        args: [],
    },
    DoubleLoad2: {
        opcode: 0x28,
        args: [],
    },
    DoubleLoad3: {
        opcode: 0x29,
        args: [],
    },

    IntStore: {
        opcode: 0x36,
        args: [
            index: LocalVariableIndexByte,
        ],
    },
    LongStore: {
        opcode: 0x37,
        args: [
            index: LocalVariableIndexByte,
        ],
    },
    FloatStore: {
        opcode: 0x38,
        args: [
            index: LocalVariableIndexByte,
        ],
    },
    DoubleStore: {
        opcode: 0x39,
        args: [
            index: LocalVariableIndexByte,
        ],
    },
    IntStore0: {
        opcode: 0x3B,
        args: [],
    },
    IntStore1: {
        opcode: 0x3C,
        args: [],
    },
    IntStore2: {
        opcode: 0x3D,
        args: [],
    },
    IntStore3: {
        opcode: 0x3E,
        args: [],
    },
    LongStore0: {
        opcode: 0x3F,
        args: [],
    },
    LongStore1: {
        opcode: 0x40,
        args: [],
    },
    LongStore2: {
        opcode: 0x41,
        args: [],
    },
    LongStore3: {
        opcode: 0x42,
        args: [],
    },
    FloatStore0: {
        opcode: 0x43,
        args: [],
    },
    FloatStore1: {
        opcode: 0x44,
        args: [],
    },
    FloatStore2: {
        opcode: 0x45,
        args: [],
    },
    FloatStore3: {
        opcode: 0x46,
        args: [],
    },
    DoubleStore0: {
        opcode: 0x47,
        args: [],
    },
    DoubleStore1: {
        opcode: 0x48,
        args: [],
    },
    DoubleStore2: {
        opcode: 0x49,
        args: [],
    },
    DoubleStore3: {
        opcode: 0x4A,
        args: [],
    },

    /// Pop a single category 1 value
    Pop: {
        opcode: 0x57,
        args: [],
    },
    /// Pop either a category 2 value or two category 1 values
    Pop2: {
        opcode: 0x58,
        args: [],
    },
    /// Duplicate the category 1 value at the top of the stack
    Dup: {
        opcode: 0x59,
        args: [],
    },

    /// val1 + val2
    IntAdd: {
        opcode: 0x60,
        args: [],
    },
    LongAdd: {
        opcode: 0x61,
        args: [],
    },
    FloatAdd: {
        opcode: 0x62,
        args: [],
    },
    DoubleAdd: {
        opcode: 0x63,
        args: [],
    },
    /// val1 - val2
    IntSubtract: {
        opcode: 0x64,
        args: [],
    },
    LongSubtract: {
        opcode: 0x65,
        args: [],
    },
    FloatSub: {
        opcode: 0x66,
        args: [],
    },
    DoubleSubtract: {
        opcode: 0x67,
        args: [],
    },
    IntMultiply: {
        opcode: 0x68,
        args: [],
    },
    LongMultiply: {
        opcode: 0x69,
        args: [],
    },
    FloatMultiply: {
        opcode: 0x6A,
        args: [],
    },
    DoubleMultiply: {
        opcode: 0x6B,
        args: [],
    },
    /// val1 / val2, truncating towards zero
    IntDivide: {
        opcode: 0x6C,
        args: [],
    },
    LongDivide: {
        opcode: 0x6D,
        args: [],
    },
    FloatDivide: {
        opcode: 0x6E,
        args: [],
    },
    DoubleDivide: {
        opcode: 0x6F,
        args: [],
    },
    /// val1 % val2, where the result has the sign of val1
    IntRemainder: {
        opcode: 0x70,
        args: [],
    },
    LongRemainder: {
        opcode: 0x71,
        args: [],
    },
    FloatRemainder: {
        opcode: 0x72,
        args: [],
    },
    DoubleRemainder: {
        opcode: 0x73,
        args: [],
    },
    IntNegate: {
        opcode: 0x74,
        args: [],
    },
    LongNegate: {
        opcode: 0x75,
        args: [],
    },
    FloatNegate: {
        opcode: 0x76,
        args: [],
    },
    DoubleNegate: {
        opcode: 0x77,
        args: [],
    },

    IntIncrement: {
        opcode: 0x84,
        args: [
            /// Index into local variable array
            index: LocalVariableIndexByte,
            /// The amount to increment by
            increment_amount: Byte,
        ],
    },

    IntToLong: {
        opcode: 0x85,
        args: [],
    },
    IntToFloat: {
        opcode: 0x86,
        args: [],
    },
    IntToDouble: {
        opcode: 0x87,
        args: [],
    },
    LongToInt: {
        opcode: 0x88,
        args: [],
    },
    LongToFloat: {
        opcode: 0x89,
        args: [],
    },
    LongToDouble: {
        opcode: 0x8A,
        args: [],
    },
    FloatToInt: {
        opcode: 0x8B,
        args: [],
    },
    FloatToLong: {
        opcode: 0x8C,
        args: [],
    },
    FloatToDouble: {
        opcode: 0x8D,
        args: [],
    },
    DoubleToInt: {
        opcode: 0x8E,
        args: [],
    },
    DoubleToLong: {
        opcode: 0x8F,
        args: [],
    },
    DoubleToFloat: {
        opcode: 0x90,
        args: [],
    },

    /// Compare two longs, pushing -1, 0 or 1
    LongCmp: {
        opcode: 0x94,
        args: [],
    },
    /// Compare two floats, pushing -1 if either is NaN
    FloatCmpL: {
        opcode: 0x95,
        args: [],
    },
    /// Compare two floats, pushing 1 if either is NaN
    FloatCmpG: {
        opcode: 0x96,
        args: [],
    },
    DoubleCmpL: {
        opcode: 0x97,
        args: [],
    },
    DoubleCmpG: {
        opcode: 0x98,
        args: [],
    },

    /// Branch if the int is zero
    IfEqZero: {
        opcode: 0x99,
        args: [
            branch_offset: BranchOffset,
        ],
    },
    IfNeZero: {
        opcode: 0x9A,
        args: [
            branch_offset: BranchOffset,
        ],
    },
    IfLtZero: {
        opcode: 0x9B,
        args: [
            branch_offset: BranchOffset,
        ],
    },
    IfGeZero: {
        opcode: 0x9C,
        args: [
            branch_offset: BranchOffset,
        ],
    },
    IfGtZero: {
        opcode: 0x9D,
        args: [
            branch_offset: BranchOffset,
        ],
    },
    IfLeZero: {
        opcode: 0x9E,
        args: [
            branch_offset: BranchOffset,
        ],
    },
    /// Branch if val1 == val2
    IfICmpEq: {
        opcode: 0x9F,
        args: [
            branch_offset: BranchOffset,
        ],
    },
    IfICmpNe: {
        opcode: 0xA0,
        args: [
            branch_offset: BranchOffset,
        ],
    },
    IfICmpLt: {
        opcode: 0xA1,
        args: [
            branch_offset: BranchOffset,
        ],
    },
    IfICmpGe: {
        opcode: 0xA2,
        args: [
            branch_offset: BranchOffset,
        ],
    },
    IfICmpGt: {
        opcode: 0xA3,
        args: [
            branch_offset: BranchOffset,
        ],
    },
    IfICmpLe: {
        opcode: 0xA4,
        args: [
            branch_offset: BranchOffset,
        ],
    },
    Goto: {
        opcode: 0xA7,
        args: [
            /// Relative to the address of the goto itself
            branch_offset: BranchOffset,
        ],
    },

    IntReturn: {
        opcode: 0xAC,
        args: [],
    },
    LongReturn: {
        opcode: 0xAD,
        args: [],
    },
    FloatReturn: {
        opcode: 0xAE,
        args: [],
    },
    DoubleReturn: {
        opcode: 0xAF,
        args: [],
    },
    /// Return void from the method
    Return: {
        opcode: 0xB1,
        args: [],
    },

    InvokeStatic: {
        opcode: 0xB8,
        args: [
            /// Index into const pool of current class.
            /// Must be a sym-ref to a method or an interface method
            /// which gives the name and descriptor of the method
            /// as well as a sym-ref to the class/interface which the method is found
            index: ConstantPoolIndexRaw<ConstantInfo>,
        ],
    },
]}

#[cfg(test)]
mod tests {
    use crate::{
        code::{op_ex::InstructionParseError, InstructionIndex},
        util::MemorySize,
    };

    use super::{check_instruction_duplicates, Inst};

    #[test]
    fn test_no_duplicates() {
        check_instruction_duplicates();
    }

    #[test]
    fn test_parse() {
        // bipush -2; iinc 3 -1; goto -4; invokestatic #7
        let code = [0x10, 0xFE, 0x84, 0x03, 0xFF, 0xA7, 0xFF, 0xFC, 0xB8, 0x00, 0x07];

        let inst = Inst::parse(&code, InstructionIndex(0)).unwrap();
        assert!(matches!(inst, Inst::PushByte(ref x) if x.val == -2));
        assert_eq!(inst.memory_size(), 2);

        let inst = Inst::parse(&code, InstructionIndex(2)).unwrap();
        match inst {
            Inst::IntIncrement(x) => {
                assert_eq!(x.index, 3);
                assert_eq!(x.increment_amount, -1);
            }
            v => panic!("expected iinc, got {:?}", v),
        }

        let inst = Inst::parse(&code, InstructionIndex(5)).unwrap();
        assert!(matches!(inst, Inst::Goto(ref x) if x.branch_offset == -4));
        assert_eq!(inst.memory_size(), 3);

        let inst = Inst::parse(&code, InstructionIndex(8)).unwrap();
        assert!(matches!(inst, Inst::InvokeStatic(ref x) if x.index.0 == 7));
        assert_eq!(inst.name(), "InvokeStatic");
        assert_eq!(inst.opcode(), 0xB8);
    }

    #[test]
    fn test_parse_errors() {
        // sipush missing its second byte
        let code = [0x11, 0x00];
        assert_eq!(
            Inst::parse(&code, InstructionIndex(0)).unwrap_err(),
            InstructionParseError::NotEnoughData {
                opcode: 0x11,
                needed: 3,
                had: 2,
            }
        );

        // invokevirtual is not implemented
        let code = [0x00, 0xB6, 0x00, 0x01];
        assert_eq!(
            Inst::parse(&code, InstructionIndex(1)).unwrap_err(),
            InstructionParseError::UnknownOpcode {
                idx: InstructionIndex(1),
                opcode: 0xB6,
            }
        );

        assert_eq!(
            Inst::parse(&code, InstructionIndex(4)).unwrap_err(),
            InstructionParseError::ExpectedOpCodeAt(InstructionIndex(4))
        );
    }
}
