//! Field and method descriptors, the compact type signatures used throughout the class file.
use std::fmt;

use smallvec::SmallVec;

use crate::util::class_source_name;

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DescriptorError {
    /// There was no type after the array markers
    Empty,
    /// A character which does not start any type
    UnknownType(char),
    /// `L;`
    EmptyClassName,
    /// `L` without a terminating `;`
    UnterminatedClassName,
    /// Void can only be a return type, never an array component or parameter
    InvalidVoid,
    /// There was text left over after the type
    TrailingCharacters(String),
    /// A method descriptor did not start with `(`
    MissingOpeningParen,
    /// A method descriptor did not have a `)` closing its parameters
    MissingClosingParen,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DescriptorTypeBasic {
    Void,
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
    /// The internal name of the class, like `java/lang/String`
    Class(String),
}
impl DescriptorTypeBasic {
    fn from_letter(letter: char) -> Option<DescriptorTypeBasic> {
        Some(match letter {
            'V' => DescriptorTypeBasic::Void,
            'B' => DescriptorTypeBasic::Byte,
            'C' => DescriptorTypeBasic::Char,
            'D' => DescriptorTypeBasic::Double,
            'F' => DescriptorTypeBasic::Float,
            'I' => DescriptorTypeBasic::Int,
            'J' => DescriptorTypeBasic::Long,
            'S' => DescriptorTypeBasic::Short,
            'Z' => DescriptorTypeBasic::Boolean,
            _ => return None,
        })
    }

    /// The name of the type as it would be written in java source
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            DescriptorTypeBasic::Void => "void".to_owned(),
            DescriptorTypeBasic::Byte => "byte".to_owned(),
            DescriptorTypeBasic::Char => "char".to_owned(),
            DescriptorTypeBasic::Double => "double".to_owned(),
            DescriptorTypeBasic::Float => "float".to_owned(),
            DescriptorTypeBasic::Int => "int".to_owned(),
            DescriptorTypeBasic::Long => "long".to_owned(),
            DescriptorTypeBasic::Short => "short".to_owned(),
            DescriptorTypeBasic::Boolean => "boolean".to_owned(),
            DescriptorTypeBasic::Class(name) => class_source_name(name),
        }
    }
}

/// A decoded field descriptor, or a single parameter/return type of a method descriptor
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeDescriptor {
    /// Number of leading `[`
    pub array_depth: usize,
    pub kind: DescriptorTypeBasic,
}
impl TypeDescriptor {
    #[must_use]
    pub fn new(kind: DescriptorTypeBasic) -> TypeDescriptor {
        TypeDescriptor {
            array_depth: 0,
            kind,
        }
    }

    #[must_use]
    pub fn new_array(array_depth: usize, kind: DescriptorTypeBasic) -> TypeDescriptor {
        TypeDescriptor { array_depth, kind }
    }

    /// Parse an entire descriptor, such as `[[I` or `Ljava/lang/String;`
    pub fn parse(text: &str) -> Result<TypeDescriptor, DescriptorError> {
        let (desc, rest) = TypeDescriptor::parse_prefix(text)?;
        if rest.is_empty() {
            Ok(desc)
        } else {
            Err(DescriptorError::TrailingCharacters(rest.to_owned()))
        }
    }

    /// Parse the first type in `text`, returning it along with the rest of the text
    fn parse_prefix(text: &str) -> Result<(TypeDescriptor, &str), DescriptorError> {
        let stripped = text.trim_start_matches('[');
        let array_depth = text.len() - stripped.len();

        let mut chars = stripped.chars();
        let letter = chars.next().ok_or(DescriptorError::Empty)?;
        let (kind, rest) = if letter == 'L' {
            let body = chars.as_str();
            let end = body
                .find(';')
                .ok_or(DescriptorError::UnterminatedClassName)?;
            if end == 0 {
                return Err(DescriptorError::EmptyClassName);
            }
            (
                DescriptorTypeBasic::Class(body[..end].to_owned()),
                &body[end + 1..],
            )
        } else {
            let kind =
                DescriptorTypeBasic::from_letter(letter).ok_or(DescriptorError::UnknownType(letter))?;
            (kind, chars.as_str())
        };

        if array_depth != 0 && kind == DescriptorTypeBasic::Void {
            return Err(DescriptorError::InvalidVoid);
        }

        Ok((TypeDescriptor { array_depth, kind }, rest))
    }

    #[must_use]
    pub fn is_array(&self) -> bool {
        self.array_depth != 0
    }

    #[must_use]
    pub fn is_void(&self) -> bool {
        self.array_depth == 0 && self.kind == DescriptorTypeBasic::Void
    }

    /// The name of the class, if this is a class type (or an array of one)
    #[must_use]
    pub fn object_name(&self) -> Option<&str> {
        match &self.kind {
            DescriptorTypeBasic::Class(name) => Some(name),
            _ => None,
        }
    }

    /// Whether the type occupies two local variable slots (long and double)
    #[must_use]
    pub fn is_category_2(&self) -> bool {
        self.array_depth == 0
            && matches!(
                self.kind,
                DescriptorTypeBasic::Long | DescriptorTypeBasic::Double
            )
    }
}
impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.kind.name())?;
        for _ in 0..self.array_depth {
            f.write_str("[]")?;
        }
        Ok(())
    }
}

/// The number of local variable slots that values of these types occupy
#[must_use]
pub fn slot_count(types: &[TypeDescriptor]) -> usize {
    types
        .iter()
        .map(|x| if x.is_category_2() { 2 } else { 1 })
        .sum()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    parameters: SmallVec<[TypeDescriptor; 4]>,
    return_type: TypeDescriptor,
}
impl MethodDescriptor {
    /// Parse a method descriptor of the form `(Params)Return`
    pub fn parse(text: &str) -> Result<MethodDescriptor, DescriptorError> {
        let text = text
            .strip_prefix('(')
            .ok_or(DescriptorError::MissingOpeningParen)?;

        let mut parameters = SmallVec::new();
        let mut rest = text;
        loop {
            if let Some(after) = rest.strip_prefix(')') {
                rest = after;
                break;
            }
            if rest.is_empty() {
                return Err(DescriptorError::MissingClosingParen);
            }

            let (param, after) = TypeDescriptor::parse_prefix(rest)?;
            if param.is_void() {
                return Err(DescriptorError::InvalidVoid);
            }
            parameters.push(param);
            rest = after;
        }

        let return_type = TypeDescriptor::parse(rest)?;

        Ok(MethodDescriptor {
            parameters,
            return_type,
        })
    }

    #[must_use]
    pub fn parameters(&self) -> &[TypeDescriptor] {
        &self.parameters
    }

    #[must_use]
    pub fn return_type(&self) -> &TypeDescriptor {
        &self.return_type
    }

    /// The number of local variable slots the parameters take up, not including any `this`
    #[must_use]
    pub fn parameter_slots(&self) -> usize {
        slot_count(&self.parameters)
    }

    #[must_use]
    pub fn into_parts(self) -> (SmallVec<[TypeDescriptor; 4]>, TypeDescriptor) {
        (self.parameters, self.return_type)
    }
}
