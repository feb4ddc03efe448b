use std::io::Read;

use indexmap::IndexMap;

use crate::{
    attribute::{parse_source_file, read_attributes, AttributeInfo, SOURCE_FILE_ATTRIBUTE},
    code::method::MethodInfo,
    constant_pool::{ClassConstant, ConstantPool, ConstantPoolError, ConstantPoolIndexRaw},
    descriptor::TypeDescriptor,
    reader::ClassReader,
    ClassFileParseError, ParseConfig, CLASS_MAGIC,
};

bitflags::bitflags! {
    pub struct ClassAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const FINAL = 0x0010;
        /// Treat superclass methods specially when invoked by invokespecial
        const SUPER = 0x0020;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
        const MODULE = 0x8000;
    }
}

bitflags::bitflags! {
    pub struct FieldAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const VOLATILE = 0x0040;
        const TRANSIENT = 0x0080;
        const SYNTHETIC = 0x1000;
        const ENUM = 0x4000;
    }
}

#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub(crate) access_flags: FieldAccessFlags,
    pub(crate) name: String,
    pub(crate) field_type: TypeDescriptor,
    pub(crate) attributes: Vec<AttributeInfo>,
}
impl FieldInfo {
    fn parse<R: Read>(
        reader: &mut ClassReader<R>,
        pool: &ConstantPool,
    ) -> Result<FieldInfo, ClassFileParseError> {
        let access_flags = FieldAccessFlags::from_bits_truncate(reader.read_u2()?);
        let name = pool.get_text(reader.read_index()?)?.to_owned();
        let field_type = TypeDescriptor::parse(pool.get_text(reader.read_index()?)?)?;
        let attributes = read_attributes(reader, pool)?
            .into_iter()
            .map(|x| x.into_info())
            .collect();

        Ok(FieldInfo {
            access_flags,
            name,
            field_type,
            attributes,
        })
    }

    #[must_use]
    pub fn access_flags(&self) -> FieldAccessFlags {
        self.access_flags
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn field_type(&self) -> &TypeDescriptor {
        &self.field_type
    }

    #[must_use]
    pub fn attributes(&self) -> &[AttributeInfo] {
        &self.attributes
    }
}

/// A fully parsed class file.
/// This is never modified after it has been parsed.
#[derive(Debug, Clone)]
pub struct ClassFile {
    pub(crate) magic: u32,
    pub(crate) minor_version: u16,
    pub(crate) major_version: u16,
    pub(crate) constant_pool: ConstantPool,
    pub(crate) access_flags: ClassAccessFlags,
    pub(crate) this_class: ConstantPoolIndexRaw<ClassConstant>,
    /// Zero only for `java/lang/Object`
    pub(crate) super_class: ConstantPoolIndexRaw<ClassConstant>,
    pub(crate) interfaces: Vec<ConstantPoolIndexRaw<ClassConstant>>,
    pub(crate) fields: Vec<FieldInfo>,
    /// Keyed by [`MethodInfo::signature`], kept in the order they were declared
    pub(crate) methods: IndexMap<String, MethodInfo>,
    pub(crate) attributes: Vec<AttributeInfo>,
    pub(crate) source_file: Option<String>,
}
impl ClassFile {
    pub fn parse<R: Read>(reader: &mut ClassReader<R>) -> Result<ClassFile, ClassFileParseError> {
        ClassFile::parse_with(reader, &ParseConfig::default())
    }

    pub fn parse_with<R: Read>(
        reader: &mut ClassReader<R>,
        conf: &ParseConfig,
    ) -> Result<ClassFile, ClassFileParseError> {
        let magic = reader.read_u4()?;
        if conf.verify_magic && magic != CLASS_MAGIC {
            return Err(ClassFileParseError::BadMagic(magic));
        }

        let minor_version = reader.read_u2()?;
        let major_version = reader.read_u2()?;
        tracing::trace!("Class file version: {}.{}", major_version, minor_version);

        let constant_pool = ConstantPool::parse(reader)?;

        let access_flags = ClassAccessFlags::from_bits_truncate(reader.read_u2()?);
        let this_class = reader.read_index()?;
        let super_class = reader.read_index()?;

        let interface_count = reader.read_u2()?;
        let mut interfaces = Vec::with_capacity(usize::from(interface_count));
        for _ in 0..interface_count {
            interfaces.push(reader.read_index()?);
        }

        let field_count = reader.read_u2()?;
        tracing::trace!("Field count: {}", field_count);
        let mut fields = Vec::with_capacity(usize::from(field_count));
        for _ in 0..field_count {
            fields.push(FieldInfo::parse(reader, &constant_pool)?);
        }

        let method_count = reader.read_u2()?;
        tracing::trace!("Method count: {}", method_count);
        let mut methods: IndexMap<String, MethodInfo> =
            IndexMap::with_capacity(usize::from(method_count));
        for _ in 0..method_count {
            let method = MethodInfo::parse(reader, &constant_pool)?;
            let signature = method.signature();
            if methods.insert(signature, method).is_some() {
                tracing::warn!("Duplicate method overwrote an earlier definition");
            }
        }

        let mut source_file = None;
        let mut attributes = Vec::new();
        for raw in read_attributes(reader, &constant_pool)? {
            if raw.name == SOURCE_FILE_ATTRIBUTE {
                source_file = Some(parse_source_file(&raw, &constant_pool)?);
            } else {
                attributes.push(raw.into_info());
            }
        }

        let class_file = ClassFile {
            magic,
            minor_version,
            major_version,
            constant_pool,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
            source_file,
        };

        // Resolving the name up front means a broken this_class is reported at parse time
        let name = class_file.get_this_name()?;
        tracing::info!("Parsed class {}", name);

        Ok(class_file)
    }

    #[must_use]
    pub fn magic(&self) -> u32 {
        self.magic
    }

    #[must_use]
    pub fn minor_version(&self) -> u16 {
        self.minor_version
    }

    #[must_use]
    pub fn major_version(&self) -> u16 {
        self.major_version
    }

    #[must_use]
    pub fn constant_pool(&self) -> &ConstantPool {
        &self.constant_pool
    }

    #[must_use]
    pub fn access_flags(&self) -> ClassAccessFlags {
        self.access_flags
    }

    #[must_use]
    pub fn this_class(&self) -> ConstantPoolIndexRaw<ClassConstant> {
        self.this_class
    }

    #[must_use]
    pub fn super_class(&self) -> ConstantPoolIndexRaw<ClassConstant> {
        self.super_class
    }

    #[must_use]
    pub fn interfaces(&self) -> &[ConstantPoolIndexRaw<ClassConstant>] {
        &self.interfaces
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldInfo] {
        &self.fields
    }

    pub fn methods(&self) -> impl Iterator<Item = &MethodInfo> + '_ {
        self.methods.values()
    }

    #[must_use]
    pub fn attributes(&self) -> &[AttributeInfo] {
        &self.attributes
    }

    #[must_use]
    pub fn source_file(&self) -> Option<&str> {
        self.source_file.as_deref()
    }

    /// The internal name of this class, like `java/lang/String`
    pub fn get_this_name(&self) -> Result<&str, ConstantPoolError> {
        self.constant_pool.get_class_name(self.this_class)
    }

    /// The internal name of the super class, `None` if the class has no super class
    pub fn get_super_name(&self) -> Result<Option<&str>, ConstantPoolError> {
        if self.super_class.is_zero() {
            Ok(None)
        } else {
            self.constant_pool.get_class_name(self.super_class).map(Some)
        }
    }

    /// Get a method by its signature, `name ++ descriptor`
    #[must_use]
    pub fn get_method_by_signature(&self, signature: &str) -> Option<&MethodInfo> {
        self.methods.get(signature)
    }

    #[must_use]
    pub fn get_method(&self, name: &str, descriptor: &str) -> Option<&MethodInfo> {
        self.methods.get(format!("{}{}", name, descriptor).as_str())
    }

    /// The `public static void main(String[])` method, if there is one
    #[must_use]
    pub fn entry_point(&self) -> Option<&MethodInfo> {
        self.methods.values().find(|x| x.is_entry_point())
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        code::{method::MethodAccessFlags, InstructionIndex, LineNumberEntry},
        constant_pool::ConstantPoolError,
        descriptor::DescriptorTypeBasic,
        reader::ClassReader,
        writer::{ClassBuilder, CodeBuilder},
        ClassFileParseError, ParseConfig,
    };

    use super::{ClassAccessFlags, ClassFile, FieldAccessFlags};

    fn parse(data: &[u8]) -> Result<ClassFile, ClassFileParseError> {
        ClassFile::parse(&mut ClassReader::new(data))
    }

    #[test]
    fn test_minimal_class() {
        let data = ClassBuilder::new("Hello", Some("java/lang/Object")).build();
        let class_file = parse(&data).unwrap();
        assert_eq!(class_file.magic(), 0xCAFE_BABE);
        assert_eq!(class_file.major_version(), 52);
        assert_eq!(class_file.get_this_name().unwrap(), "Hello");
        assert_eq!(class_file.get_super_name().unwrap(), Some("java/lang/Object"));
        assert!(class_file.access_flags().contains(ClassAccessFlags::PUBLIC));
        assert!(class_file.fields().is_empty());
        assert_eq!(class_file.methods().count(), 0);
        assert_eq!(class_file.source_file(), None);
    }

    #[test]
    fn test_no_super() {
        let data = ClassBuilder::new("java/lang/Object", None).build();
        let class_file = parse(&data).unwrap();
        assert_eq!(class_file.get_super_name().unwrap(), None);
    }

    #[test]
    fn test_members() {
        let mut builder = ClassBuilder::new("pkg/Hello", Some("java/lang/Object"));
        builder.source_file("Hello.java");
        builder.interface("java/lang/Runnable");
        builder.field(
            FieldAccessFlags::PRIVATE | FieldAccessFlags::STATIC,
            "counts",
            "[J",
        );
        let exception = builder.pool().class("java/io/IOException");
        builder.method_with_exceptions(
            MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
            "main",
            "([Ljava/lang/String;)V",
            Some(
                CodeBuilder::new(1, 1, vec![0xB1])
                    .line_number(0, 3)
                    .line_number(0, 4),
            ),
            vec![exception],
        );
        builder.method(
            MethodAccessFlags::PUBLIC | MethodAccessFlags::ABSTRACT,
            "run",
            "()V",
            None,
        );
        let data = builder.build();

        let class_file = parse(&data).unwrap();
        assert_eq!(class_file.source_file(), Some("Hello.java"));
        assert_eq!(class_file.interfaces().len(), 1);
        assert_eq!(
            class_file
                .constant_pool()
                .get_class_name(class_file.interfaces()[0])
                .unwrap(),
            "java/lang/Runnable"
        );

        let field = &class_file.fields()[0];
        assert_eq!(field.name(), "counts");
        assert_eq!(field.field_type().array_depth, 1);
        assert_eq!(field.field_type().kind, DescriptorTypeBasic::Long);
        assert!(field.access_flags().contains(FieldAccessFlags::STATIC));

        let main = class_file
            .get_method("main", "([Ljava/lang/String;)V")
            .unwrap();
        assert!(main.is_entry_point());
        assert!(main.return_type().is_void());
        assert_eq!(main.argument_types().len(), 1);
        assert_eq!(main.argument_types()[0].object_name(), Some("java/lang/String"));
        assert_eq!(main.exceptions().len(), 1);
        let code = main.code().unwrap();
        assert_eq!(code.max_stack(), 1);
        assert_eq!(code.max_locals(), 1);
        assert_eq!(code.code(), &[0xB1]);
        assert_eq!(
            code.line_number_table(),
            &[
                LineNumberEntry {
                    start_pc: InstructionIndex(0),
                    line_number: 3
                },
                LineNumberEntry {
                    start_pc: InstructionIndex(0),
                    line_number: 4
                }
            ]
        );
        assert!(class_file.entry_point().is_some());

        let run = class_file.get_method_by_signature("run()V").unwrap();
        assert!(run.code().is_none());
        assert!(!run.should_have_code());
    }

    #[test]
    fn test_duplicate_method_overwrites() {
        let mut builder = ClassBuilder::new("Hello", Some("java/lang/Object"));
        builder.method(
            MethodAccessFlags::STATIC,
            "f",
            "()I",
            Some(CodeBuilder::new(1, 0, vec![0x03, 0xAC])),
        );
        builder.method(
            MethodAccessFlags::STATIC,
            "f",
            "()I",
            Some(CodeBuilder::new(1, 0, vec![0x04, 0xAC])),
        );
        let class_file = parse(&builder.build()).unwrap();
        assert_eq!(class_file.methods().count(), 1);
        let f = class_file.get_method("f", "()I").unwrap();
        assert_eq!(f.code().unwrap().code(), &[0x04, 0xAC]);
    }

    #[test]
    fn test_entry_point_requires_static() {
        let mut builder = ClassBuilder::new("Hello", Some("java/lang/Object"));
        builder.method(
            MethodAccessFlags::PUBLIC,
            "main",
            "([Ljava/lang/String;)V",
            Some(CodeBuilder::new(0, 2, vec![0xB1])),
        );
        let class_file = parse(&builder.build()).unwrap();
        assert!(class_file.entry_point().is_none());
    }

    #[test]
    fn test_bad_magic() {
        let mut data = ClassBuilder::new("Hello", Some("java/lang/Object")).build();
        data[0] = 0xDE;
        assert!(matches!(
            parse(&data),
            Err(ClassFileParseError::BadMagic(0xDEFE_BABE))
        ));

        let conf = ParseConfig {
            verify_magic: false,
        };
        let class_file = ClassFile::parse_with(&mut ClassReader::new(data.as_slice()), &conf)
            .unwrap();
        assert_eq!(class_file.magic(), 0xDEFE_BABE);
    }

    #[test]
    fn test_truncated_anywhere() {
        let mut builder = ClassBuilder::new("Hello", Some("java/lang/Object"));
        builder.source_file("Hello.java");
        builder.method(
            MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
            "main",
            "([Ljava/lang/String;)V",
            Some(CodeBuilder::new(1, 1, vec![0xB1]).line_number(0, 1)),
        );
        let data = builder.build();
        assert!(parse(&data).is_ok());

        // Every strict prefix must fail, never producing a partial class
        for len in 0..data.len() {
            match parse(&data[..len]) {
                Err(ClassFileParseError::Truncated { .. }) => {}
                v => panic!("prefix of length {} gave {:?}", len, v),
            }
        }
    }

    #[test]
    fn test_bad_this_class() {
        let mut builder = ClassBuilder::new("Hello", Some("java/lang/Object"));
        // Point this_class at the utf8 holding the name instead of the class entry
        let name = builder.pool().utf8("Hello");
        builder.set_this_class_index(name);
        assert!(matches!(
            parse(&builder.build()),
            Err(ClassFileParseError::ConstantPool(
                ConstantPoolError::IncorrectType { .. }
            ))
        ));
    }
}
