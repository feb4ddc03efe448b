//! Human readable output of a parsed class file, in a form resembling java source.
use std::io::Write;

use itertools::Itertools;

use crate::{
    class::{ClassAccessFlags, ClassFile, FieldAccessFlags, FieldInfo},
    code::method::{MethodAccessFlags, MethodInfo},
    constant_pool::ConstantPoolError,
    util::{class_simple_name, class_source_name},
};

#[derive(Debug)]
pub enum PrintError {
    Io(std::io::Error),
    ConstantPool(ConstantPoolError),
}
impl From<std::io::Error> for PrintError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}
impl From<ConstantPoolError> for PrintError {
    fn from(err: ConstantPoolError) -> Self {
        Self::ConstantPool(err)
    }
}

/// The first visibility keyword that applies, public taking precedence over private over
/// protected
fn visibility(public: bool, private: bool, protected: bool) -> &'static str {
    if public {
        "public "
    } else if private {
        "private "
    } else if protected {
        "protected "
    } else {
        ""
    }
}

fn static_keyword(is_static: bool) -> &'static str {
    if is_static {
        "static "
    } else {
        ""
    }
}

/// Write the class header, then its fields, methods and attributes
pub fn write_class<W: Write>(w: &mut W, class_file: &ClassFile) -> Result<(), PrintError> {
    let flags = class_file.access_flags();
    let kind = if flags.contains(ClassAccessFlags::INTERFACE) {
        "interface"
    } else {
        "class"
    };
    let public = if flags.contains(ClassAccessFlags::PUBLIC) {
        "public "
    } else {
        ""
    };
    write!(
        w,
        "{}{} {}",
        public,
        kind,
        class_source_name(class_file.get_this_name()?)
    )?;
    if let Some(super_name) = class_file.get_super_name()? {
        write!(w, " extends {}", class_source_name(super_name))?;
    }
    writeln!(
        w,
        " (version {}.{})",
        class_file.major_version(),
        class_file.minor_version()
    )?;

    write_fields(w, class_file)?;
    write_methods(w, class_file)?;
    write_attributes(w, class_file)?;
    Ok(())
}

pub fn write_fields<W: Write>(w: &mut W, class_file: &ClassFile) -> Result<(), PrintError> {
    for field in class_file.fields() {
        write_field(w, field)?;
    }
    Ok(())
}

fn write_field<W: Write>(w: &mut W, field: &FieldInfo) -> Result<(), PrintError> {
    let flags = field.access_flags();
    writeln!(
        w,
        "{}{}{} {};",
        visibility(
            flags.contains(FieldAccessFlags::PUBLIC),
            flags.contains(FieldAccessFlags::PRIVATE),
            flags.contains(FieldAccessFlags::PROTECTED)
        ),
        static_keyword(flags.contains(FieldAccessFlags::STATIC)),
        field.field_type(),
        field.name()
    )?;
    Ok(())
}

pub fn write_methods<W: Write>(w: &mut W, class_file: &ClassFile) -> Result<(), PrintError> {
    let class_name = class_file.get_this_name()?;
    for method in class_file.methods() {
        write_method(w, class_name, method)?;
    }
    Ok(())
}

fn write_method<W: Write>(
    w: &mut W,
    class_name: &str,
    method: &MethodInfo,
) -> Result<(), PrintError> {
    let flags = method.access_flags();
    write!(
        w,
        "{}{}",
        visibility(
            flags.contains(MethodAccessFlags::PUBLIC),
            flags.contains(MethodAccessFlags::PRIVATE),
            flags.contains(MethodAccessFlags::PROTECTED)
        ),
        static_keyword(flags.contains(MethodAccessFlags::STATIC)),
    )?;

    // Constructors are written like they are in source, with the class name and no return type
    if method.is_constructor() {
        write!(w, "{}", class_simple_name(class_name))?;
    } else {
        write!(w, "{} {}", method.return_type(), method.name())?;
    }
    writeln!(w, "({});", method.argument_types().iter().join(", "))?;

    if let Some(code) = method.code() {
        let args = method.argument_types().len() + usize::from(!method.is_static());
        writeln!(
            w,
            "    stack={}, locals={}, args={}",
            code.max_stack(),
            code.max_locals(),
            args
        )?;
        for entry in code.line_number_table() {
            writeln!(w, "    line {}: {}", entry.line_number, entry.start_pc.0)?;
        }
    }

    Ok(())
}

pub fn write_attributes<W: Write>(w: &mut W, class_file: &ClassFile) -> Result<(), PrintError> {
    if let Some(source_file) = class_file.source_file() {
        writeln!(w, "SourceFile: {}", source_file)?;
    }
    for attribute in class_file.attributes() {
        writeln!(w, "{}: {} bytes", attribute.name, attribute.info.len())?;
    }
    Ok(())
}
