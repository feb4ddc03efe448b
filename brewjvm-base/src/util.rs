use std::borrow::Cow;

/// Convert the modified-utf8 text of the class file into a rust string.
/// Returns `None` if the bytes are not valid modified-utf8.
#[must_use]
pub fn convert_classfile_text(bytes: &[u8]) -> Option<Cow<str>> {
    cesu8::from_java_cesu8(bytes).ok()
}

/// The last part of an internal class name.
/// `java/lang/String` -> `String`
#[must_use]
pub fn class_simple_name(class_name: &str) -> &str {
    class_name
        .rsplit_once('/')
        .map_or(class_name, |(_, simple)| simple)
}

/// Convert an internal class name into the dotted form used in java source.
/// `java/lang/String` -> `java.lang.String`
#[must_use]
pub fn class_source_name(class_name: &str) -> String {
    class_name.replace('/', ".")
}

pub trait MemorySize {
    fn memory_size(&self) -> usize;
}
pub trait StaticMemorySize {
    const MEMORY_SIZE: usize;
}
impl<T: StaticMemorySize> MemorySize for T {
    fn memory_size(&self) -> usize {
        T::MEMORY_SIZE
    }
}
