use brewjvm_base::descriptor::{DescriptorTypeBasic, TypeDescriptor};

/// A value held on the operand stack or in a local variable
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RuntimeValue {
    /// The only reference that can exist, since there is no heap
    Null,
    /// Int, and the smaller types (byte/short/char/boolean) which are represented as an int
    I32(i32),
    /// Long
    I64(i64),
    /// Float
    F32(f32),
    /// Double
    F64(f64),
}
impl RuntimeValue {
    #[must_use]
    pub fn into_int(self) -> Option<i32> {
        match self {
            RuntimeValue::I32(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_long(self) -> Option<i64> {
        match self {
            RuntimeValue::I64(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_float(self) -> Option<f32> {
        match self {
            RuntimeValue::F32(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_double(self) -> Option<f64> {
        match self {
            RuntimeValue::F64(v) => Some(v),
            _ => None,
        }
    }

    /// Long and double take up two slots in the locals, and two units of the operand stack
    #[must_use]
    pub fn is_category_2(&self) -> bool {
        matches!(self, RuntimeValue::I64(_) | RuntimeValue::F64(_))
    }

    /// The number of local slots / stack units this value takes up
    #[must_use]
    pub fn slot_size(&self) -> usize {
        if self.is_category_2() {
            2
        } else {
            1
        }
    }

    /// Check whether the value could be passed where a value of type `desc` is expected
    #[must_use]
    pub fn is_of_type(&self, desc: &TypeDescriptor) -> bool {
        if desc.is_array() {
            return matches!(self, RuntimeValue::Null);
        }

        match (&desc.kind, self) {
            (
                DescriptorTypeBasic::Byte
                | DescriptorTypeBasic::Char
                | DescriptorTypeBasic::Short
                | DescriptorTypeBasic::Boolean
                | DescriptorTypeBasic::Int,
                RuntimeValue::I32(_),
            )
            | (DescriptorTypeBasic::Long, RuntimeValue::I64(_))
            | (DescriptorTypeBasic::Float, RuntimeValue::F32(_))
            | (DescriptorTypeBasic::Double, RuntimeValue::F64(_))
            | (DescriptorTypeBasic::Class(_), RuntimeValue::Null) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use brewjvm_base::descriptor::TypeDescriptor;

    use super::RuntimeValue;

    #[test]
    fn test_accessors() {
        assert_eq!(RuntimeValue::I32(4).into_int(), Some(4));
        assert_eq!(RuntimeValue::I32(4).into_long(), None);
        assert_eq!(RuntimeValue::F32(4.0).into_int(), None);
        assert_eq!(RuntimeValue::I64(4).into_long(), Some(4));
        assert_eq!(RuntimeValue::F64(2.5).into_double(), Some(2.5));
        assert!(RuntimeValue::F64(2.5).is_category_2());
        assert!(!RuntimeValue::F32(2.5).is_category_2());
        assert_eq!(RuntimeValue::Null.slot_size(), 1);
    }

    #[test]
    fn test_is_of_type() {
        let int = TypeDescriptor::parse("I").unwrap();
        let boolean = TypeDescriptor::parse("Z").unwrap();
        let long = TypeDescriptor::parse("J").unwrap();
        let string = TypeDescriptor::parse("Ljava/lang/String;").unwrap();
        let array = TypeDescriptor::parse("[I").unwrap();

        assert!(RuntimeValue::I32(1).is_of_type(&int));
        assert!(RuntimeValue::I32(1).is_of_type(&boolean));
        assert!(!RuntimeValue::I32(1).is_of_type(&long));
        assert!(RuntimeValue::I64(1).is_of_type(&long));
        assert!(RuntimeValue::Null.is_of_type(&string));
        assert!(RuntimeValue::Null.is_of_type(&array));
        assert!(!RuntimeValue::I32(0).is_of_type(&array));
    }
}
