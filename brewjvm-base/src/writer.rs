//! Writing class file data back out.
//! [`ConstantPool::write_to`] reproduces the bytes of a parsed pool, and [`ClassBuilder`] assembles
//! entire class files, which is primarily useful for producing classes in tests.
use crate::{
    attribute::{
        CODE_ATTRIBUTE, EXCEPTIONS_ATTRIBUTE, LINE_NUMBER_TABLE_ATTRIBUTE, SOURCE_FILE_ATTRIBUTE,
    },
    class::{ClassAccessFlags, FieldAccessFlags},
    code::method::MethodAccessFlags,
    constant_pool::{
        ClassConstant, ConstantInfo, ConstantPool, ConstantPoolIndexRaw, DoubleConstant,
        FloatConstant, IntegerConstant, InterfaceMethodRefConstant, LongConstant,
        MethodRefConstant, NameAndTypeConstant, StringConstant, Utf8Constant,
    },
    CLASS_MAGIC,
};

/// Big-endian output, the counterpart of [`crate::reader::ClassReader`]
#[derive(Debug, Default, Clone)]
pub struct ClassWriter {
    data: Vec<u8>,
}
impl ClassWriter {
    #[must_use]
    pub fn new() -> ClassWriter {
        ClassWriter::default()
    }

    pub fn write_u1(&mut self, v: u8) {
        self.data.push(v);
    }

    pub fn write_u2(&mut self, v: u16) {
        self.data.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_u4(&mut self, v: u32) {
        self.data.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_u8(&mut self, v: u64) {
        self.data.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_bytes(&mut self, v: &[u8]) {
        self.data.extend_from_slice(v);
    }

    pub fn write_index<T>(&mut self, index: ConstantPoolIndexRaw<T>) {
        self.write_u2(index.0);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

impl ConstantInfo {
    pub fn write_to(&self, writer: &mut ClassWriter) {
        writer.write_u1(self.tag());
        match self {
            ConstantInfo::Utf8(v) => {
                writer.write_u2(v.bytes.len() as u16);
                writer.write_bytes(&v.bytes);
            }
            ConstantInfo::Integer(v) => writer.write_u4(v.value as u32),
            ConstantInfo::Float(v) => writer.write_u4(v.value.to_bits()),
            ConstantInfo::Long(v) => writer.write_u8(v.value as u64),
            ConstantInfo::Double(v) => writer.write_u8(v.value.to_bits()),
            ConstantInfo::Class(v) => writer.write_index(v.name_index),
            ConstantInfo::String(v) => writer.write_index(v.string_index),
            ConstantInfo::FieldRef(v) => {
                writer.write_index(v.class_index);
                writer.write_index(v.name_and_type_index);
            }
            ConstantInfo::MethodRef(v) => {
                writer.write_index(v.class_index);
                writer.write_index(v.name_and_type_index);
            }
            ConstantInfo::InterfaceMethodRef(v) => {
                writer.write_index(v.class_index);
                writer.write_index(v.name_and_type_index);
            }
            ConstantInfo::NameAndType(v) => {
                writer.write_index(v.name_index);
                writer.write_index(v.descriptor_index);
            }
            ConstantInfo::MethodHandle(v) => {
                writer.write_u1(v.reference_kind);
                writer.write_index(v.reference_index);
            }
            ConstantInfo::MethodType(v) => writer.write_index(v.descriptor_index),
            ConstantInfo::InvokeDynamic(v) => {
                writer.write_u2(v.bootstrap_method_attr_index);
                writer.write_index(v.name_and_type_index);
            }
            ConstantInfo::Module(v) => writer.write_index(v.name_index),
            ConstantInfo::Package(v) => writer.write_index(v.name_index),
        }
    }
}

impl ConstantPool {
    /// Write the count followed by every entry.
    /// Placeholder slots have no representation of their own.
    pub fn write_to(&self, writer: &mut ClassWriter) {
        writer.write_u2(self.count());
        for (_, entry) in self.iter() {
            entry.write_to(writer);
        }
    }
}

/// Builds up a constant pool, reusing identical entries
#[derive(Debug, Clone)]
pub struct PoolBuilder {
    pool: ConstantPool,
}
impl PoolBuilder {
    #[must_use]
    pub fn new() -> PoolBuilder {
        PoolBuilder {
            pool: ConstantPool::empty(),
        }
    }

    /// Add the entry, or get the index of an identical entry that was already added
    pub fn add(&mut self, info: ConstantInfo) -> u16 {
        if let Some((index, _)) = self.pool.iter().find(|(_, x)| **x == info) {
            return index;
        }
        self.pool.push(info)
    }

    pub fn utf8(&mut self, text: &str) -> u16 {
        let bytes = cesu8::to_java_cesu8(text).into_owned();
        self.add(ConstantInfo::Utf8(Utf8Constant {
            text: text.to_owned(),
            bytes,
        }))
    }

    pub fn integer(&mut self, value: i32) -> u16 {
        self.add(ConstantInfo::Integer(IntegerConstant { value }))
    }

    pub fn float(&mut self, value: f32) -> u16 {
        self.add(ConstantInfo::Float(FloatConstant { value }))
    }

    pub fn long(&mut self, value: i64) -> u16 {
        self.add(ConstantInfo::Long(LongConstant { value }))
    }

    pub fn double(&mut self, value: f64) -> u16 {
        self.add(ConstantInfo::Double(DoubleConstant { value }))
    }

    pub fn class(&mut self, name: &str) -> u16 {
        let name_index = ConstantPoolIndexRaw::new(self.utf8(name));
        self.add(ConstantInfo::Class(ClassConstant { name_index }))
    }

    pub fn string(&mut self, text: &str) -> u16 {
        let string_index = ConstantPoolIndexRaw::new(self.utf8(text));
        self.add(ConstantInfo::String(StringConstant { string_index }))
    }

    pub fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name_index = ConstantPoolIndexRaw::new(self.utf8(name));
        let descriptor_index = ConstantPoolIndexRaw::new(self.utf8(descriptor));
        self.add(ConstantInfo::NameAndType(NameAndTypeConstant {
            name_index,
            descriptor_index,
        }))
    }

    pub fn method_ref(&mut self, class_name: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = ConstantPoolIndexRaw::new(self.class(class_name));
        let name_and_type_index = ConstantPoolIndexRaw::new(self.name_and_type(name, descriptor));
        self.add(ConstantInfo::MethodRef(MethodRefConstant {
            class_index,
            name_and_type_index,
        }))
    }

    pub fn interface_method_ref(&mut self, class_name: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = ConstantPoolIndexRaw::new(self.class(class_name));
        let name_and_type_index = ConstantPoolIndexRaw::new(self.name_and_type(name, descriptor));
        self.add(ConstantInfo::InterfaceMethodRef(InterfaceMethodRefConstant {
            class_index,
            name_and_type_index,
        }))
    }

    #[must_use]
    pub fn pool(&self) -> &ConstantPool {
        &self.pool
    }
}
impl Default for PoolBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The contents of a `Code` attribute
#[derive(Debug, Clone)]
pub struct CodeBuilder {
    max_stack: u16,
    max_locals: u16,
    code: Vec<u8>,
    /// (start, end, handler, catch type)
    exception_table: Vec<(u16, u16, u16, u16)>,
    /// (start pc, line)
    line_numbers: Vec<(u16, u16)>,
}
impl CodeBuilder {
    #[must_use]
    pub fn new(max_stack: u16, max_locals: u16, code: Vec<u8>) -> CodeBuilder {
        CodeBuilder {
            max_stack,
            max_locals,
            code,
            exception_table: Vec::new(),
            line_numbers: Vec::new(),
        }
    }

    #[must_use]
    pub fn exception(mut self, start_pc: u16, end_pc: u16, handler_pc: u16, catch_type: u16) -> Self {
        self.exception_table
            .push((start_pc, end_pc, handler_pc, catch_type));
        self
    }

    #[must_use]
    pub fn line_number(mut self, start_pc: u16, line_number: u16) -> Self {
        self.line_numbers.push((start_pc, line_number));
        self
    }

    fn write_to(&self, pool: &mut PoolBuilder, writer: &mut ClassWriter) {
        let mut body = ClassWriter::new();
        body.write_u2(self.max_stack);
        body.write_u2(self.max_locals);
        body.write_u4(self.code.len() as u32);
        body.write_bytes(&self.code);
        body.write_u2(self.exception_table.len() as u16);
        for (start, end, handler, catch_type) in &self.exception_table {
            body.write_u2(*start);
            body.write_u2(*end);
            body.write_u2(*handler);
            body.write_u2(*catch_type);
        }

        if self.line_numbers.is_empty() {
            body.write_u2(0);
        } else {
            body.write_u2(1);
            let mut table = ClassWriter::new();
            table.write_u2(self.line_numbers.len() as u16);
            for (start_pc, line_number) in &self.line_numbers {
                table.write_u2(*start_pc);
                table.write_u2(*line_number);
            }
            write_attribute(pool, &mut body, LINE_NUMBER_TABLE_ATTRIBUTE, &table.into_bytes());
        }

        write_attribute(pool, writer, CODE_ATTRIBUTE, &body.into_bytes());
    }
}

fn write_attribute(pool: &mut PoolBuilder, writer: &mut ClassWriter, name: &str, payload: &[u8]) {
    writer.write_u2(pool.utf8(name));
    writer.write_u4(payload.len() as u32);
    writer.write_bytes(payload);
}

/// Assembles the bytes of a class file.
/// Fields and methods are encoded as they are added, so that every constant they need is in the
/// pool before it is written.
#[derive(Debug, Clone)]
pub struct ClassBuilder {
    pool: PoolBuilder,
    minor_version: u16,
    major_version: u16,
    access_flags: ClassAccessFlags,
    this_class: u16,
    super_class: u16,
    interfaces: Vec<u16>,
    fields: Vec<Vec<u8>>,
    methods: Vec<Vec<u8>>,
    source_file: Option<u16>,
}
impl ClassBuilder {
    #[must_use]
    pub fn new(name: &str, super_name: Option<&str>) -> ClassBuilder {
        let mut pool = PoolBuilder::new();
        let this_class = pool.class(name);
        let super_class = super_name.map_or(0, |x| pool.class(x));
        ClassBuilder {
            pool,
            minor_version: 0,
            major_version: 52,
            access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
            this_class,
            super_class,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            source_file: None,
        }
    }

    pub fn pool(&mut self) -> &mut PoolBuilder {
        &mut self.pool
    }

    pub fn version(&mut self, major_version: u16, minor_version: u16) -> &mut Self {
        self.major_version = major_version;
        self.minor_version = minor_version;
        self
    }

    pub fn access_flags(&mut self, access_flags: ClassAccessFlags) -> &mut Self {
        self.access_flags = access_flags;
        self
    }

    /// Directly set the pool index used as this class
    pub fn set_this_class_index(&mut self, index: u16) -> &mut Self {
        self.this_class = index;
        self
    }

    pub fn interface(&mut self, name: &str) -> &mut Self {
        let index = self.pool.class(name);
        self.interfaces.push(index);
        self
    }

    pub fn source_file(&mut self, name: &str) -> &mut Self {
        self.source_file = Some(self.pool.utf8(name));
        self
    }

    pub fn field(&mut self, access_flags: FieldAccessFlags, name: &str, descriptor: &str) -> &mut Self {
        let mut writer = ClassWriter::new();
        writer.write_u2(access_flags.bits());
        writer.write_u2(self.pool.utf8(name));
        writer.write_u2(self.pool.utf8(descriptor));
        writer.write_u2(0);
        self.fields.push(writer.into_bytes());
        self
    }

    pub fn method(
        &mut self,
        access_flags: MethodAccessFlags,
        name: &str,
        descriptor: &str,
        code: Option<CodeBuilder>,
    ) -> &mut Self {
        self.method_with_exceptions(access_flags, name, descriptor, code, Vec::new())
    }

    /// Add a method, with `exceptions` being class indices for an `Exceptions` attribute
    pub fn method_with_exceptions(
        &mut self,
        access_flags: MethodAccessFlags,
        name: &str,
        descriptor: &str,
        code: Option<CodeBuilder>,
        exceptions: Vec<u16>,
    ) -> &mut Self {
        let mut writer = ClassWriter::new();
        writer.write_u2(access_flags.bits());
        writer.write_u2(self.pool.utf8(name));
        writer.write_u2(self.pool.utf8(descriptor));

        let attribute_count = u16::from(code.is_some()) + u16::from(!exceptions.is_empty());
        writer.write_u2(attribute_count);
        if let Some(code) = code {
            code.write_to(&mut self.pool, &mut writer);
        }
        if !exceptions.is_empty() {
            let mut payload = ClassWriter::new();
            payload.write_u2(exceptions.len() as u16);
            for exception in exceptions {
                payload.write_u2(exception);
            }
            write_attribute(
                &mut self.pool,
                &mut writer,
                EXCEPTIONS_ATTRIBUTE,
                &payload.into_bytes(),
            );
        }

        self.methods.push(writer.into_bytes());
        self
    }

    #[must_use]
    pub fn build(mut self) -> Vec<u8> {
        // The attribute name has to be in the pool before the pool is written
        let source_file = self.source_file.map(|index| {
            let mut payload = ClassWriter::new();
            payload.write_u2(index);
            let mut attribute = ClassWriter::new();
            write_attribute(
                &mut self.pool,
                &mut attribute,
                SOURCE_FILE_ATTRIBUTE,
                &payload.into_bytes(),
            );
            attribute.into_bytes()
        });

        let mut writer = ClassWriter::new();
        writer.write_u4(CLASS_MAGIC);
        writer.write_u2(self.minor_version);
        writer.write_u2(self.major_version);
        self.pool.pool().write_to(&mut writer);
        writer.write_u2(self.access_flags.bits());
        writer.write_u2(self.this_class);
        writer.write_u2(self.super_class);

        writer.write_u2(self.interfaces.len() as u16);
        for interface in &self.interfaces {
            writer.write_u2(*interface);
        }

        writer.write_u2(self.fields.len() as u16);
        for field in &self.fields {
            writer.write_bytes(field);
        }

        writer.write_u2(self.methods.len() as u16);
        for method in &self.methods {
            writer.write_bytes(method);
        }

        if let Some(source_file) = source_file {
            writer.write_u2(1);
            writer.write_bytes(&source_file);
        } else {
            writer.write_u2(0);
        }

        writer.into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        constant_pool::{ConstantPool, ConstantPoolIndexRaw},
        reader::ClassReader,
    };

    use super::{ClassWriter, PoolBuilder};

    fn round_trip(data: &[u8]) {
        let pool = ConstantPool::parse(&mut ClassReader::new(data)).unwrap();
        let mut writer = ClassWriter::new();
        pool.write_to(&mut writer);
        assert_eq!(writer.into_bytes(), data);
    }

    #[test]
    fn test_round_trip() {
        round_trip(&[0x00, 0x01]);
        round_trip(&[
            0x00, 0x0F, // count
            0x01, 0x00, 0x05, b'H', b'e', b'l', b'l', b'o', // #1 utf8
            0x07, 0x00, 0x01, // #2 class
            0x05, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // #3 long, #4
            0x06, 0x7F, 0xF8, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, // #5 double NaN, #6
            0x04, 0x3F, 0xC0, 0x00, 0x00, // #7 float
            0x08, 0x00, 0x01, // #8 string
            0x0C, 0x00, 0x01, 0x00, 0x01, // #9 name and type
            0x0A, 0x00, 0x02, 0x00, 0x09, // #10 method ref
            0x0F, 0x06, 0x00, 0x0A, // #11 method handle
            0x10, 0x00, 0x01, // #12 method type
            0x12, 0x00, 0x00, 0x00, 0x09, // #13 invoke dynamic
            0x13, 0x00, 0x01, // #14 module
        ]);
        // Modified utf8 bytes are kept exactly
        round_trip(&[0x00, 0x02, 0x01, 0x00, 0x02, 0xC0, 0x80]);
    }

    #[test]
    fn test_pool_builder_interns() {
        let mut pool = PoolBuilder::new();
        let a = pool.method_ref("Hello", "add", "(II)I");
        let b = pool.method_ref("Hello", "add", "(II)I");
        assert_eq!(a, b);
        let long = pool.long(5);
        let after = pool.utf8("after");
        assert_eq!(after, long + 2);
        let class = pool.class("Hello");
        assert_eq!(class, pool.class("Hello"));
        assert_eq!(
            pool.pool()
                .get_class_name(ConstantPoolIndexRaw::new(class))
                .unwrap(),
            "Hello"
        );
    }
}
