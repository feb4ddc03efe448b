use super::{op::RawOpcode, InstructionIndex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstructionParseError {
    /// The code array ended before all of the instruction's operands
    NotEnoughData {
        opcode: RawOpcode,
        needed: usize,
        had: usize,
    },
    ExpectedOpCodeAt(InstructionIndex),
    /// The opcode is not one of the instructions that are implemented
    UnknownOpcode {
        idx: InstructionIndex,
        opcode: RawOpcode,
    },
}
