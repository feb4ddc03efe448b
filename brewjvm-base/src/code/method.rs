use std::io::Read;

use smallvec::SmallVec;

use crate::{
    attribute::{
        parse_exceptions, read_attributes, AttributeInfo, CODE_ATTRIBUTE, EXCEPTIONS_ATTRIBUTE,
    },
    constant_pool::{ClassConstant, ConstantPool, ConstantPoolIndexRaw},
    descriptor::{slot_count, MethodDescriptor, TypeDescriptor},
    reader::ClassReader,
    ClassFileParseError,
};

use super::CodeInfo;

pub const ENTRY_POINT_NAME: &str = "main";
pub const ENTRY_POINT_DESCRIPTOR: &str = "([Ljava/lang/String;)V";
pub const CONSTRUCTOR_NAME: &str = "<init>";

bitflags::bitflags! {
    pub struct MethodAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SYNCHRONIZED = 0x0020;
        /// Generated by the compiler to bridge generic signatures
        const BRIDGE = 0x0040;
        const VARARGS = 0x0080;
        const NATIVE = 0x0100;
        const ABSTRACT = 0x0400;
        const STRICT = 0x0800;
        const SYNTHETIC = 0x1000;
    }
}

#[derive(Debug, Clone)]
pub struct MethodInfo {
    pub(crate) access_flags: MethodAccessFlags,
    pub(crate) name: String,
    /// The descriptor as it was in the class file
    pub(crate) descriptor: String,
    pub(crate) return_type: TypeDescriptor,
    pub(crate) argument_types: SmallVec<[TypeDescriptor; 4]>,
    pub(crate) code: Option<CodeInfo>,
    /// The checked exceptions listed in the `Exceptions` attribute
    pub(crate) exceptions: Vec<ConstantPoolIndexRaw<ClassConstant>>,
    pub(crate) attributes: Vec<AttributeInfo>,
}
impl MethodInfo {
    pub(crate) fn parse<R: Read>(
        reader: &mut ClassReader<R>,
        pool: &ConstantPool,
    ) -> Result<MethodInfo, ClassFileParseError> {
        let access_flags = MethodAccessFlags::from_bits_truncate(reader.read_u2()?);
        let name = pool.get_text(reader.read_index()?)?.to_owned();
        let descriptor = pool.get_text(reader.read_index()?)?.to_owned();
        let (argument_types, return_type) = MethodDescriptor::parse(&descriptor)?.into_parts();

        let mut code = None;
        let mut exceptions = Vec::new();
        let mut attributes = Vec::new();
        for raw in read_attributes(reader, pool)? {
            if raw.name == CODE_ATTRIBUTE {
                code = Some(CodeInfo::parse(&raw, pool)?);
            } else if raw.name == EXCEPTIONS_ATTRIBUTE {
                exceptions = parse_exceptions(&raw)?;
            } else {
                attributes.push(raw.into_info());
            }
        }

        Ok(MethodInfo {
            access_flags,
            name,
            descriptor,
            return_type,
            argument_types,
            code,
            exceptions,
            attributes,
        })
    }

    #[must_use]
    pub fn access_flags(&self) -> MethodAccessFlags {
        self.access_flags
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    /// The key the method is stored under in its class, the name followed by the descriptor
    #[must_use]
    pub fn signature(&self) -> String {
        format!("{}{}", self.name, self.descriptor)
    }

    #[must_use]
    pub fn return_type(&self) -> &TypeDescriptor {
        &self.return_type
    }

    #[must_use]
    pub fn argument_types(&self) -> &[TypeDescriptor] {
        &self.argument_types
    }

    #[must_use]
    pub fn code(&self) -> Option<&CodeInfo> {
        self.code.as_ref()
    }

    #[must_use]
    pub fn exceptions(&self) -> &[ConstantPoolIndexRaw<ClassConstant>] {
        &self.exceptions
    }

    #[must_use]
    pub fn attributes(&self) -> &[AttributeInfo] {
        &self.attributes
    }

    #[must_use]
    pub fn is_static(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::STATIC)
    }

    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.name == CONSTRUCTOR_NAME
    }

    /// Native and abstract methods have no code
    #[must_use]
    pub fn should_have_code(&self) -> bool {
        !self
            .access_flags
            .intersects(MethodAccessFlags::NATIVE | MethodAccessFlags::ABSTRACT)
    }

    /// Whether this is `public static void main(String[])`
    #[must_use]
    pub fn is_entry_point(&self) -> bool {
        self.access_flags
            .contains(MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC)
            && self.name == ENTRY_POINT_NAME
            && self.descriptor == ENTRY_POINT_DESCRIPTOR
    }

    /// The number of local variable slots the arguments occupy
    #[must_use]
    pub fn argument_slots(&self) -> usize {
        slot_count(&self.argument_types)
    }
}
