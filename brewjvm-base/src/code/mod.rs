use std::io::Read;

use crate::{
    attribute::{
        read_attributes, AttributeInfo, RawAttribute, CODE_ATTRIBUTE,
        LINE_NUMBER_TABLE_ATTRIBUTE,
    },
    constant_pool::{ClassConstant, ConstantPool, ConstantPoolIndexRaw},
    reader::ClassReader,
    ClassFileParseError,
};

use self::{op::Inst, op_ex::InstructionParseError};

pub mod method;
pub mod op;
pub mod op_ex;
pub mod types;

/// An index into the code array of a method, also known as the program counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstructionIndex(pub u16);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionEntry {
    /// Inclusive
    pub start_pc: InstructionIndex,
    /// Exclusive
    pub end_pc: InstructionIndex,
    pub handler_pc: InstructionIndex,
    /// Zero means the handler catches everything
    pub catch_type: ConstantPoolIndexRaw<ClassConstant>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineNumberEntry {
    pub start_pc: InstructionIndex,
    pub line_number: u16,
}

#[derive(Debug, Clone)]
pub struct CodeInfo {
    pub(crate) max_stack: u16,
    pub(crate) max_locals: u16,
    pub(crate) code: Vec<u8>,
    pub(crate) exception_table: Vec<ExceptionEntry>,
    pub(crate) line_number_table: Vec<LineNumberEntry>,
    pub(crate) attributes: Vec<AttributeInfo>,
}
impl CodeInfo {
    pub(crate) fn parse(
        raw: &RawAttribute,
        pool: &ConstantPool,
    ) -> Result<CodeInfo, ClassFileParseError> {
        raw.decode(CODE_ATTRIBUTE, |reader| CodeInfo::parse_body(reader, pool))
    }

    fn parse_body<R: Read>(
        reader: &mut ClassReader<R>,
        pool: &ConstantPool,
    ) -> Result<CodeInfo, ClassFileParseError> {
        let max_stack = reader.read_u2()?;
        let max_locals = reader.read_u2()?;

        let code_length = reader.read_u4()?;
        if code_length > u32::from(u16::MAX) {
            return Err(ClassFileParseError::CodeTooLong(code_length));
        }
        let code = reader.read_bytes(code_length as usize)?;

        let exception_count = reader.read_u2()?;
        let mut exception_table = Vec::with_capacity(usize::from(exception_count));
        for _ in 0..exception_count {
            exception_table.push(ExceptionEntry {
                start_pc: InstructionIndex(reader.read_u2()?),
                end_pc: InstructionIndex(reader.read_u2()?),
                handler_pc: InstructionIndex(reader.read_u2()?),
                catch_type: reader.read_index()?,
            });
        }

        let mut line_number_table = Vec::new();
        let mut attributes = Vec::new();
        for raw in read_attributes(reader, pool)? {
            if raw.name == LINE_NUMBER_TABLE_ATTRIBUTE {
                // There may be multiple, in which case they are simply joined
                line_number_table.extend(parse_line_number_table(&raw)?);
            } else {
                attributes.push(raw.into_info());
            }
        }

        Ok(CodeInfo {
            max_stack,
            max_locals,
            code,
            exception_table,
            line_number_table,
            attributes,
        })
    }

    #[must_use]
    pub fn max_stack(&self) -> u16 {
        self.max_stack
    }

    #[must_use]
    pub fn max_locals(&self) -> u16 {
        self.max_locals
    }

    /// The raw bytecode
    #[must_use]
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    #[must_use]
    pub fn exception_table(&self) -> &[ExceptionEntry] {
        &self.exception_table
    }

    #[must_use]
    pub fn line_number_table(&self) -> &[LineNumberEntry] {
        &self.line_number_table
    }

    #[must_use]
    pub fn attributes(&self) -> &[AttributeInfo] {
        &self.attributes
    }

    /// Decode the instruction that starts at `idx`
    pub fn instruction_at(&self, idx: InstructionIndex) -> Result<Inst, InstructionParseError> {
        Inst::parse(&self.code, idx)
    }
}

fn parse_line_number_table(
    raw: &RawAttribute,
) -> Result<Vec<LineNumberEntry>, ClassFileParseError> {
    raw.decode(LINE_NUMBER_TABLE_ATTRIBUTE, |reader| {
        let count = reader.read_u2()?;
        let mut table = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            table.push(LineNumberEntry {
                start_pc: InstructionIndex(reader.read_u2()?),
                line_number: reader.read_u2()?,
            });
        }
        Ok(table)
    })
}
