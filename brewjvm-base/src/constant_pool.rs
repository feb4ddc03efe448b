//! The constant pool of a class file.
//!
//! Indices are kept exactly as they appear in the class file. Slot 0 is never valid, and the slot
//! following a long or double is an unusable placeholder, so every index can be dereferenced
//! directly without any adjustment.
use std::{
    fmt,
    hash::{Hash, Hasher},
    io::Read,
    marker::PhantomData,
};

use crate::{reader::ClassReader, util::convert_classfile_text, ClassFileParseError};

/// An index into the constant pool which is expected to refer to a `T`
pub struct ConstantPoolIndexRaw<T>(pub u16, PhantomData<fn() -> T>);
impl<T> ConstantPoolIndexRaw<T> {
    #[must_use]
    pub const fn new(index: u16) -> ConstantPoolIndexRaw<T> {
        ConstantPoolIndexRaw(index, PhantomData)
    }

    #[must_use]
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Forget the kind of entry this index refers to
    #[must_use]
    pub fn into_generic(self) -> ConstantPoolIndexRaw<ConstantInfo> {
        ConstantPoolIndexRaw::new(self.0)
    }
}
impl<T> Clone for ConstantPoolIndexRaw<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for ConstantPoolIndexRaw<T> {}
impl<T> PartialEq for ConstantPoolIndexRaw<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl<T> Eq for ConstantPoolIndexRaw<T> {}
impl<T> Hash for ConstantPoolIndexRaw<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}
impl<T> fmt::Debug for ConstantPoolIndexRaw<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConstantPoolError {
    /// The index was zero or past the end of the pool
    InvalidIndex(u16),
    /// The index referred to the slot that follows a long or double
    Unusable(u16),
    /// The entry at the index was not the kind that was expected
    IncorrectType {
        index: u16,
        expected: &'static str,
        found: &'static str,
    },
}

/// Implemented by every constant kind so that a [`ConstantPoolIndexRaw`] can be narrowed to the
/// kind it refers to.
pub trait ConstantKind: Sized {
    const NAME: &'static str;

    fn narrow(info: &ConstantInfo) -> Option<&Self>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utf8Constant {
    /// The text, converted from modified-utf8
    pub text: String,
    /// The bytes as they were in the class file
    pub bytes: Vec<u8>,
}
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegerConstant {
    pub value: i32,
}
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloatConstant {
    pub value: f32,
}
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LongConstant {
    pub value: i64,
}
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DoubleConstant {
    pub value: f64,
}
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassConstant {
    pub name_index: ConstantPoolIndexRaw<Utf8Constant>,
}
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringConstant {
    pub string_index: ConstantPoolIndexRaw<Utf8Constant>,
}
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRefConstant {
    pub class_index: ConstantPoolIndexRaw<ClassConstant>,
    pub name_and_type_index: ConstantPoolIndexRaw<NameAndTypeConstant>,
}
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodRefConstant {
    pub class_index: ConstantPoolIndexRaw<ClassConstant>,
    pub name_and_type_index: ConstantPoolIndexRaw<NameAndTypeConstant>,
}
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceMethodRefConstant {
    pub class_index: ConstantPoolIndexRaw<ClassConstant>,
    pub name_and_type_index: ConstantPoolIndexRaw<NameAndTypeConstant>,
}
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameAndTypeConstant {
    pub name_index: ConstantPoolIndexRaw<Utf8Constant>,
    pub descriptor_index: ConstantPoolIndexRaw<Utf8Constant>,
}
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodHandleConstant {
    pub reference_kind: u8,
    pub reference_index: ConstantPoolIndexRaw<ConstantInfo>,
}
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodTypeConstant {
    pub descriptor_index: ConstantPoolIndexRaw<Utf8Constant>,
}
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvokeDynamicConstant {
    /// Index into the `BootstrapMethods` attribute, not the constant pool
    pub bootstrap_method_attr_index: u16,
    pub name_and_type_index: ConstantPoolIndexRaw<NameAndTypeConstant>,
}
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleConstant {
    pub name_index: ConstantPoolIndexRaw<Utf8Constant>,
}
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageConstant {
    pub name_index: ConstantPoolIndexRaw<Utf8Constant>,
}

macro_rules! define_constant_info {
    ($($variant:ident ($constant:ident) = $tag:expr),* $(,)*) => {
        #[derive(Debug, Clone, PartialEq)]
        pub enum ConstantInfo {
            $(
                $variant($constant),
            )*
        }
        impl ConstantInfo {
            /// The tag byte which this kind of entry is written with
            #[must_use]
            pub fn tag(&self) -> u8 {
                match self {
                    $(
                        ConstantInfo::$variant(_) => $tag,
                    )*
                }
            }

            #[must_use]
            pub fn name(&self) -> &'static str {
                match self {
                    $(
                        ConstantInfo::$variant(_) => stringify!($variant),
                    )*
                }
            }
        }
        $(
            impl ConstantKind for $constant {
                const NAME: &'static str = stringify!($variant);

                fn narrow(info: &ConstantInfo) -> Option<&Self> {
                    match info {
                        ConstantInfo::$variant(v) => Some(v),
                        #[allow(unreachable_patterns)]
                        _ => None,
                    }
                }
            }
            impl From<$constant> for ConstantInfo {
                fn from(v: $constant) -> ConstantInfo {
                    ConstantInfo::$variant(v)
                }
            }
        )*
    };
}
define_constant_info! {
    Utf8(Utf8Constant) = 1,
    Integer(IntegerConstant) = 3,
    Float(FloatConstant) = 4,
    Long(LongConstant) = 5,
    Double(DoubleConstant) = 6,
    Class(ClassConstant) = 7,
    String(StringConstant) = 8,
    FieldRef(FieldRefConstant) = 9,
    MethodRef(MethodRefConstant) = 10,
    InterfaceMethodRef(InterfaceMethodRefConstant) = 11,
    NameAndType(NameAndTypeConstant) = 12,
    MethodHandle(MethodHandleConstant) = 15,
    MethodType(MethodTypeConstant) = 16,
    InvokeDynamic(InvokeDynamicConstant) = 18,
    Module(ModuleConstant) = 19,
    Package(PackageConstant) = 20,
}
impl ConstantInfo {
    /// Whether this entry takes up two slots in the pool
    #[must_use]
    pub fn is_wide(&self) -> bool {
        matches!(self, ConstantInfo::Long(_) | ConstantInfo::Double(_))
    }

    /// Parse a single entry, including its tag.
    /// `index` is only used for error reporting.
    fn parse<R: Read>(
        reader: &mut ClassReader<R>,
        index: u16,
    ) -> Result<ConstantInfo, ClassFileParseError> {
        let tag = reader.read_u1()?;
        Ok(match tag {
            1 => {
                let length = reader.read_u2()?;
                let bytes = reader.read_bytes(usize::from(length))?;
                let text = convert_classfile_text(&bytes)
                    .ok_or(ClassFileParseError::InvalidText { index })?
                    .into_owned();
                ConstantInfo::Utf8(Utf8Constant { text, bytes })
            }
            3 => ConstantInfo::Integer(IntegerConstant {
                value: reader.read_u4()? as i32,
            }),
            4 => ConstantInfo::Float(FloatConstant {
                value: f32::from_bits(reader.read_u4()?),
            }),
            5 => ConstantInfo::Long(LongConstant {
                value: reader.read_u8()? as i64,
            }),
            6 => ConstantInfo::Double(DoubleConstant {
                value: f64::from_bits(reader.read_u8()?),
            }),
            7 => ConstantInfo::Class(ClassConstant {
                name_index: reader.read_index()?,
            }),
            8 => ConstantInfo::String(StringConstant {
                string_index: reader.read_index()?,
            }),
            9 => ConstantInfo::FieldRef(FieldRefConstant {
                class_index: reader.read_index()?,
                name_and_type_index: reader.read_index()?,
            }),
            10 => ConstantInfo::MethodRef(MethodRefConstant {
                class_index: reader.read_index()?,
                name_and_type_index: reader.read_index()?,
            }),
            11 => ConstantInfo::InterfaceMethodRef(InterfaceMethodRefConstant {
                class_index: reader.read_index()?,
                name_and_type_index: reader.read_index()?,
            }),
            12 => ConstantInfo::NameAndType(NameAndTypeConstant {
                name_index: reader.read_index()?,
                descriptor_index: reader.read_index()?,
            }),
            15 => ConstantInfo::MethodHandle(MethodHandleConstant {
                reference_kind: reader.read_u1()?,
                reference_index: reader.read_index()?,
            }),
            16 => ConstantInfo::MethodType(MethodTypeConstant {
                descriptor_index: reader.read_index()?,
            }),
            18 => ConstantInfo::InvokeDynamic(InvokeDynamicConstant {
                bootstrap_method_attr_index: reader.read_u2()?,
                name_and_type_index: reader.read_index()?,
            }),
            19 => ConstantInfo::Module(ModuleConstant {
                name_index: reader.read_index()?,
            }),
            20 => ConstantInfo::Package(PackageConstant {
                name_index: reader.read_index()?,
            }),
            _ => return Err(ClassFileParseError::UnknownConstantTag { index, tag }),
        })
    }
}
impl ConstantKind for ConstantInfo {
    const NAME: &'static str = "Any";

    fn narrow(info: &ConstantInfo) -> Option<&Self> {
        Some(info)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstantPool {
    /// Slot 0 and the slots after longs/doubles are `None`
    entries: Vec<Option<ConstantInfo>>,
}
impl ConstantPool {
    /// A pool holding nothing but the unused zeroth slot
    #[must_use]
    pub fn empty() -> ConstantPool {
        ConstantPool {
            entries: vec![None],
        }
    }

    pub fn parse<R: Read>(reader: &mut ClassReader<R>) -> Result<ConstantPool, ClassFileParseError> {
        let count = reader.read_u2()?;
        tracing::trace!("Constant pool count: {}", count);

        let mut entries = Vec::with_capacity(usize::from(count).max(1));
        entries.push(None);

        // The count is one more than the number of slots actually in the file
        let mut index = 1;
        while index < count {
            let entry = ConstantInfo::parse(reader, index)?;
            let is_wide = entry.is_wide();
            entries.push(Some(entry));
            if is_wide {
                entries.push(None);
                index = index.saturating_add(2);
            } else {
                index += 1;
            }
        }

        Ok(ConstantPool { entries })
    }

    /// Add an entry to the end of the pool, returning the index it was placed at.
    /// Longs and doubles also get their placeholder slot.
    pub(crate) fn push(&mut self, info: ConstantInfo) -> u16 {
        let index = self.entries.len() as u16;
        let is_wide = info.is_wide();
        self.entries.push(Some(info));
        if is_wide {
            self.entries.push(None);
        }
        index
    }

    /// The count as it would be written in the class file, which includes slot zero.
    #[must_use]
    pub fn count(&self) -> u16 {
        self.entries.len() as u16
    }

    /// Iterate over all usable entries, along with their index
    pub fn iter(&self) -> impl Iterator<Item = (u16, &ConstantInfo)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(i, x)| x.as_ref().map(|x| (i as u16, x)))
    }

    pub fn get(&self, index: u16) -> Result<&ConstantInfo, ConstantPoolError> {
        if index == 0 {
            return Err(ConstantPoolError::InvalidIndex(index));
        }

        match self.entries.get(usize::from(index)) {
            Some(Some(entry)) => Ok(entry),
            Some(None) => Err(ConstantPoolError::Unusable(index)),
            None => Err(ConstantPoolError::InvalidIndex(index)),
        }
    }

    /// Get the entry at the index, requiring it to be of the kind the index says it is
    pub fn get_t<T: ConstantKind>(
        &self,
        index: ConstantPoolIndexRaw<T>,
    ) -> Result<&T, ConstantPoolError> {
        let entry = self.get(index.0)?;
        T::narrow(entry).ok_or(ConstantPoolError::IncorrectType {
            index: index.0,
            expected: T::NAME,
            found: entry.name(),
        })
    }

    /// Resolve the index to the text of a utf8 entry
    pub fn get_text(
        &self,
        index: ConstantPoolIndexRaw<Utf8Constant>,
    ) -> Result<&str, ConstantPoolError> {
        self.get_t(index).map(|x| x.text.as_str())
    }

    /// Resolve a class entry to the name it holds
    pub fn get_class_name(
        &self,
        index: ConstantPoolIndexRaw<ClassConstant>,
    ) -> Result<&str, ConstantPoolError> {
        let class = self.get_t(index)?;
        self.get_text(class.name_index)
    }

    /// Resolve a name-and-type entry into its `(name, descriptor)`
    pub fn get_name_and_type(
        &self,
        index: ConstantPoolIndexRaw<NameAndTypeConstant>,
    ) -> Result<(&str, &str), ConstantPoolError> {
        let nat = self.get_t(index)?;
        let name = self.get_text(nat.name_index)?;
        let descriptor = self.get_text(nat.descriptor_index)?;
        Ok((name, descriptor))
    }
}

#[cfg(test)]
mod tests {
    use crate::{reader::ClassReader, ClassFileParseError};

    use super::{
        ClassConstant, ConstantInfo, ConstantPool, ConstantPoolError, ConstantPoolIndexRaw,
        LongConstant, Utf8Constant,
    };

    fn parse(data: &[u8]) -> Result<ConstantPool, ClassFileParseError> {
        ConstantPool::parse(&mut ClassReader::new(data))
    }

    #[test]
    fn test_parse_pool() {
        let data: &[u8] = &[
            0x00, 0x06, // count
            0x01, 0x00, 0x05, b'H', b'e', b'l', b'l', b'o', // #1 utf8
            0x07, 0x00, 0x01, // #2 class -> #1
            0x05, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, // #3 long, #4 unusable
            0x03, 0xFF, 0xFF, 0xFF, 0xFE, // #5 int
        ];
        let pool = parse(data).unwrap();
        assert_eq!(pool.count(), 6);
        assert_eq!(pool.get_class_name(ConstantPoolIndexRaw::new(2)).unwrap(), "Hello");
        assert_eq!(
            pool.get_t(ConstantPoolIndexRaw::<LongConstant>::new(3))
                .unwrap()
                .value,
            256
        );
        assert_eq!(
            pool.get(5).unwrap(),
            &ConstantInfo::Integer(super::IntegerConstant { value: -2 })
        );
        assert_eq!(pool.iter().count(), 4);
    }

    #[test]
    fn test_wide_placeholder() {
        let data: &[u8] = &[
            0x00, 0x04, // count
            0x06, 0x40, 0x09, 0x21, 0xFB, 0x54, 0x44, 0x2D, 0x18, // #1 double, #2 unusable
            0x01, 0x00, 0x01, b'x', // #3 utf8
        ];
        let pool = parse(data).unwrap();
        assert_eq!(pool.get(2), Err(ConstantPoolError::Unusable(2)));
        assert_eq!(
            pool.get_text(ConstantPoolIndexRaw::new(2)),
            Err(ConstantPoolError::Unusable(2))
        );
        assert_eq!(pool.get_text(ConstantPoolIndexRaw::new(3)).unwrap(), "x");
        match pool.get(1).unwrap() {
            ConstantInfo::Double(d) => assert!((d.value - std::f64::consts::PI).abs() < 1e-12),
            v => panic!("expected double, got {:?}", v),
        }
    }

    #[test]
    fn test_bad_indices() {
        let data: &[u8] = &[0x00, 0x02, 0x01, 0x00, 0x01, b'a'];
        let pool = parse(data).unwrap();
        assert_eq!(pool.get(0), Err(ConstantPoolError::InvalidIndex(0)));
        assert_eq!(pool.get(2), Err(ConstantPoolError::InvalidIndex(2)));
        assert_eq!(
            pool.get_t(ConstantPoolIndexRaw::<ClassConstant>::new(1)),
            Err(ConstantPoolError::IncorrectType {
                index: 1,
                expected: "Class",
                found: "Utf8",
            })
        );
        assert!(pool
            .get_t(ConstantPoolIndexRaw::<Utf8Constant>::new(1))
            .is_ok());
    }

    #[test]
    fn test_unknown_tag() {
        let data: &[u8] = &[0x00, 0x03, 0x01, 0x00, 0x00, 0x02, 0x00, 0x00];
        match parse(data) {
            Err(ClassFileParseError::UnknownConstantTag { index, tag }) => {
                assert_eq!(index, 2);
                assert_eq!(tag, 2);
            }
            v => panic!("expected unknown tag error, got {:?}", v),
        }
    }

    #[test]
    fn test_truncated_utf8() {
        let data: &[u8] = &[0x00, 0x02, 0x01, 0x00, 0x05, b'a', b'b'];
        assert!(matches!(
            parse(data),
            Err(ClassFileParseError::Truncated {
                needed: 5,
                had: 2,
                ..
            })
        ));
    }

    #[test]
    fn test_modified_utf8() {
        // Modified utf8 encodes the null character as two bytes
        let data: &[u8] = &[0x00, 0x02, 0x01, 0x00, 0x03, b'a', 0xC0, 0x80];
        let pool = parse(data).unwrap();
        assert_eq!(pool.get_text(ConstantPoolIndexRaw::new(1)).unwrap(), "a\0");
    }
}
