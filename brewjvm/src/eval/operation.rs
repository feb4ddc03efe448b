// Conversions follow the JVM, which truncates and saturates the same way `as` does
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]

use brewjvm_base::code::op::{
    DoubleAdd, DoubleDivide, DoubleMultiply, DoubleNegate, DoubleRemainder, DoubleSubtract,
    DoubleToFloat, DoubleToInt, DoubleToLong, FloatAdd, FloatDivide, FloatMultiply, FloatNegate,
    FloatRemainder, FloatSub, FloatToDouble, FloatToInt, FloatToLong, IntAdd, IntDivide,
    IntIncrement, IntMultiply, IntNegate, IntRemainder, IntSubtract, IntToDouble, IntToFloat,
    IntToLong, LongAdd, LongDivide, LongMultiply, LongNegate, LongRemainder, LongSubtract,
    LongToDouble, LongToFloat, LongToInt,
};

use crate::{eval::EvalError, rv::RuntimeValue, GeneralError};

use super::{LocalVariableIndex, RunInstArgsC, RunInstContinue};

/// Implement an instruction which pops two values of the same type and pushes the result.
/// `$lhs` is the value that was pushed first.
macro_rules! impl_binary_op {
    ($(
        $name:ident: $into:ident, $err:ident -> $variant:ident, |$lhs:ident, $rhs:ident| $body:expr
    );* $(;)?) => {
        $(
            impl RunInstContinue for $name {
                fn run(self, RunInstArgsC { frame, .. }: RunInstArgsC) -> Result<(), GeneralError> {
                    let (v1, v2) = frame.stack.pop2().ok_or(EvalError::ExpectedStackValue)?;

                    let $rhs = v1.$into().ok_or(EvalError::$err)?;
                    let $lhs = v2.$into().ok_or(EvalError::$err)?;
                    let value = $body;

                    frame.stack.push(RuntimeValue::$variant(value))
                }
            }
        )*
    };
}

/// Implement an instruction which pops one value and pushes the result of `$body` on it
macro_rules! impl_unary_op {
    ($(
        $name:ident: $into:ident, $err:ident -> $variant:ident, |$v:ident| $body:expr
    );* $(;)?) => {
        $(
            impl RunInstContinue for $name {
                fn run(self, RunInstArgsC { frame, .. }: RunInstArgsC) -> Result<(), GeneralError> {
                    let v1 = frame.stack.pop().ok_or(EvalError::ExpectedStackValue)?;

                    let $v = v1.$into().ok_or(EvalError::$err)?;
                    let value = $body;

                    frame.stack.push(RuntimeValue::$variant(value))
                }
            }
        )*
    };
}

// === Int ===

impl RunInstContinue for IntIncrement {
    fn run(self, RunInstArgsC { frame, .. }: RunInstArgsC) -> Result<(), GeneralError> {
        let index = LocalVariableIndex::from(self.index);
        let local = frame
            .locals
            .get_mut(index)
            .ok_or(EvalError::ExpectedLocalVariable(index))?;
        let local = local
            .as_value_mut()
            .ok_or(EvalError::ExpectedLocalVariableWithValue(index))?;

        let inc = i32::from(self.increment_amount);

        let value = local
            .into_int()
            .ok_or(EvalError::ExpectedLocalVariableIntRepr(index))?;
        // Java has overflow/underflow
        let value = value.wrapping_add(inc);

        // Store the computed value into the location
        *local = RuntimeValue::I32(value);

        Ok(())
    }
}

impl_binary_op! {
    IntAdd: into_int, ExpectedStackValueIntRepr -> I32, |lhs, rhs| lhs.wrapping_add(rhs);
    IntSubtract: into_int, ExpectedStackValueIntRepr -> I32, |lhs, rhs| lhs.wrapping_sub(rhs);
    IntMultiply: into_int, ExpectedStackValueIntRepr -> I32, |lhs, rhs| lhs.wrapping_mul(rhs);
    IntDivide: into_int, ExpectedStackValueIntRepr -> I32, |lhs, rhs| {
        if rhs == 0 {
            return Err(EvalError::DivisionByZero.into());
        }
        // i32::MIN / -1 overflows back to i32::MIN
        lhs.wrapping_div(rhs)
    };
    IntRemainder: into_int, ExpectedStackValueIntRepr -> I32, |lhs, rhs| {
        if rhs == 0 {
            return Err(EvalError::DivisionByZero.into());
        }
        lhs.wrapping_rem(rhs)
    };
}
impl_unary_op! {
    IntNegate: into_int, ExpectedStackValueIntRepr -> I32, |v| v.wrapping_neg();
    IntToLong: into_int, ExpectedStackValueIntRepr -> I64, |v| i64::from(v);
    IntToFloat: into_int, ExpectedStackValueIntRepr -> F32, |v| v as f32;
    IntToDouble: into_int, ExpectedStackValueIntRepr -> F64, |v| f64::from(v);
}

// === Long ===

impl_binary_op! {
    LongAdd: into_long, ExpectedStackValueLong -> I64, |lhs, rhs| lhs.wrapping_add(rhs);
    LongSubtract: into_long, ExpectedStackValueLong -> I64, |lhs, rhs| lhs.wrapping_sub(rhs);
    LongMultiply: into_long, ExpectedStackValueLong -> I64, |lhs, rhs| lhs.wrapping_mul(rhs);
    LongDivide: into_long, ExpectedStackValueLong -> I64, |lhs, rhs| {
        if rhs == 0 {
            return Err(EvalError::DivisionByZero.into());
        }
        lhs.wrapping_div(rhs)
    };
    LongRemainder: into_long, ExpectedStackValueLong -> I64, |lhs, rhs| {
        if rhs == 0 {
            return Err(EvalError::DivisionByZero.into());
        }
        lhs.wrapping_rem(rhs)
    };
}
impl_unary_op! {
    LongNegate: into_long, ExpectedStackValueLong -> I64, |v| v.wrapping_neg();
    LongToInt: into_long, ExpectedStackValueLong -> I32, |v| v as i32;
    LongToFloat: into_long, ExpectedStackValueLong -> F32, |v| v as f32;
    LongToDouble: into_long, ExpectedStackValueLong -> F64, |v| v as f64;
}

// === Float ===

impl_binary_op! {
    FloatAdd: into_float, ExpectedStackValueFloat -> F32, |lhs, rhs| lhs + rhs;
    FloatSub: into_float, ExpectedStackValueFloat -> F32, |lhs, rhs| lhs - rhs;
    FloatMultiply: into_float, ExpectedStackValueFloat -> F32, |lhs, rhs| lhs * rhs;
    FloatDivide: into_float, ExpectedStackValueFloat -> F32, |lhs, rhs| lhs / rhs;
    // Truncating remainder, like C's fmod, rather than a modulo
    FloatRemainder: into_float, ExpectedStackValueFloat -> F32, |lhs, rhs| lhs % rhs;
}
impl_unary_op! {
    FloatNegate: into_float, ExpectedStackValueFloat -> F32, |v| -v;
    FloatToInt: into_float, ExpectedStackValueFloat -> I32, |v| v as i32;
    FloatToLong: into_float, ExpectedStackValueFloat -> I64, |v| v as i64;
    FloatToDouble: into_float, ExpectedStackValueFloat -> F64, |v| f64::from(v);
}

// === Double ===

impl_binary_op! {
    DoubleAdd: into_double, ExpectedStackValueDouble -> F64, |lhs, rhs| lhs + rhs;
    DoubleSubtract: into_double, ExpectedStackValueDouble -> F64, |lhs, rhs| lhs - rhs;
    DoubleMultiply: into_double, ExpectedStackValueDouble -> F64, |lhs, rhs| lhs * rhs;
    DoubleDivide: into_double, ExpectedStackValueDouble -> F64, |lhs, rhs| lhs / rhs;
    DoubleRemainder: into_double, ExpectedStackValueDouble -> F64, |lhs, rhs| lhs % rhs;
}
impl_unary_op! {
    DoubleNegate: into_double, ExpectedStackValueDouble -> F64, |v| -v;
    DoubleToInt: into_double, ExpectedStackValueDouble -> I32, |v| v as i32;
    DoubleToLong: into_double, ExpectedStackValueDouble -> I64, |v| v as i64;
    DoubleToFloat: into_double, ExpectedStackValueDouble -> F32, |v| v as f32;
}
