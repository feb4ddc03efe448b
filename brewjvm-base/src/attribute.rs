use std::io::Read;

use crate::{
    constant_pool::{ClassConstant, ConstantPool, ConstantPoolIndexRaw},
    reader::ClassReader,
    ClassFileParseError,
};

pub const CODE_ATTRIBUTE: &str = "Code";
pub const EXCEPTIONS_ATTRIBUTE: &str = "Exceptions";
pub const LINE_NUMBER_TABLE_ATTRIBUTE: &str = "LineNumberTable";
pub const SOURCE_FILE_ATTRIBUTE: &str = "SourceFile";

/// An attribute that is not specially decoded, kept as its name and raw bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeInfo {
    pub name: String,
    pub info: Vec<u8>,
}

/// An attribute whose payload has been read but not yet interpreted
#[derive(Debug)]
pub(crate) struct RawAttribute {
    pub(crate) name: String,
    payload: Vec<u8>,
    /// Position of the payload in the class file
    position: usize,
}
impl RawAttribute {
    pub(crate) fn read<R: Read>(
        reader: &mut ClassReader<R>,
        pool: &ConstantPool,
    ) -> Result<RawAttribute, ClassFileParseError> {
        let name_index = reader.read_index()?;
        let length = reader.read_u4()?;
        let position = reader.position();
        let payload = reader.read_bytes(length as usize)?;
        let name = pool.get_text(name_index)?.to_owned();

        Ok(RawAttribute {
            name,
            payload,
            position,
        })
    }

    pub(crate) fn into_info(self) -> AttributeInfo {
        AttributeInfo {
            name: self.name,
            info: self.payload,
        }
    }

    /// Decode the payload with `decode`, requiring it to consume exactly the declared length
    pub(crate) fn decode<T>(
        &self,
        name: &'static str,
        decode: impl FnOnce(&mut ClassReader<&[u8]>) -> Result<T, ClassFileParseError>,
    ) -> Result<T, ClassFileParseError> {
        let mut reader = ClassReader::with_position(self.payload.as_slice(), self.position);
        let value = decode(&mut reader)?;

        let remaining = reader.remaining();
        if remaining != 0 {
            let declared = self.payload.len() as u32;
            return Err(ClassFileParseError::AttributeLengthMismatch {
                name,
                declared,
                used: declared - remaining as u32,
            });
        }

        Ok(value)
    }
}

/// Read a u2 count followed by that many attributes, without interpreting any of them
pub(crate) fn read_attributes<R: Read>(
    reader: &mut ClassReader<R>,
    pool: &ConstantPool,
) -> Result<Vec<RawAttribute>, ClassFileParseError> {
    let count = reader.read_u2()?;
    let mut attributes = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        attributes.push(RawAttribute::read(reader, pool)?);
    }
    Ok(attributes)
}

pub(crate) fn parse_source_file(
    raw: &RawAttribute,
    pool: &ConstantPool,
) -> Result<String, ClassFileParseError> {
    let index = raw.decode(SOURCE_FILE_ATTRIBUTE, |reader| reader.read_index())?;
    Ok(pool.get_text(index)?.to_owned())
}

/// The checked exceptions a method declares that it throws
pub(crate) fn parse_exceptions(
    raw: &RawAttribute,
) -> Result<Vec<ConstantPoolIndexRaw<ClassConstant>>, ClassFileParseError> {
    raw.decode(EXCEPTIONS_ATTRIBUTE, |reader| {
        let count = reader.read_u2()?;
        (0..count).map(|_| reader.read_index()).collect()
    })
}
