use std::cmp::Ordering;

use brewjvm_base::code::{
    op::{
        DoubleCmpG, DoubleCmpL, DoubleReturn, FloatCmpG, FloatCmpL, FloatReturn, Goto, IfEqZero,
        IfGeZero, IfGtZero, IfICmpEq, IfICmpGe, IfICmpGt, IfICmpLe, IfICmpLt, IfICmpNe, IfLeZero,
        IfLtZero, IfNeZero, IntReturn, LongCmp, LongReturn, Return,
    },
    InstructionIndex,
};

use crate::{eval::EvalError, rv::RuntimeValue, util, GeneralError};

use super::{RunInst, RunInstArgs, RunInstArgsC, RunInstContinue, RunInstValue};

impl RunInst for Return {
    fn run(self, _: RunInstArgs) -> Result<RunInstValue, GeneralError> {
        Ok(RunInstValue::ReturnVoid)
    }
}

// It is up to the function running these to determine if it makes sense for the method
// to be returning the value
impl RunInst for IntReturn {
    fn run(self, RunInstArgs { frame, .. }: RunInstArgs) -> Result<RunInstValue, GeneralError> {
        let object = frame.stack.pop().ok_or(EvalError::ExpectedStackValue)?;
        if object.into_int().is_none() {
            return Err(EvalError::ExpectedStackValueIntRepr.into());
        }

        Ok(RunInstValue::Return(object))
    }
}

impl RunInst for LongReturn {
    fn run(self, RunInstArgs { frame, .. }: RunInstArgs) -> Result<RunInstValue, GeneralError> {
        let object = frame.stack.pop().ok_or(EvalError::ExpectedStackValue)?;
        if object.into_long().is_none() {
            return Err(EvalError::ExpectedStackValueLong.into());
        }

        Ok(RunInstValue::Return(object))
    }
}

impl RunInst for FloatReturn {
    fn run(self, RunInstArgs { frame, .. }: RunInstArgs) -> Result<RunInstValue, GeneralError> {
        let object = frame.stack.pop().ok_or(EvalError::ExpectedStackValue)?;
        if object.into_float().is_none() {
            return Err(EvalError::ExpectedStackValueFloat.into());
        }

        Ok(RunInstValue::Return(object))
    }
}

impl RunInst for DoubleReturn {
    fn run(self, RunInstArgs { frame, .. }: RunInstArgs) -> Result<RunInstValue, GeneralError> {
        let object = frame.stack.pop().ok_or(EvalError::ExpectedStackValue)?;
        if object.into_double().is_none() {
            return Err(EvalError::ExpectedStackValueDouble.into());
        }

        Ok(RunInstValue::Return(object))
    }
}

// === Comparisons ===

fn ordering_value(ordering: Ordering) -> i32 {
    match ordering {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }
}

impl RunInstContinue for LongCmp {
    fn run(self, RunInstArgsC { frame, .. }: RunInstArgsC) -> Result<(), GeneralError> {
        let (v1, v2) = frame.stack.pop2().ok_or(EvalError::ExpectedStackValue)?;
        let v1 = v1.into_long().ok_or(EvalError::ExpectedStackValueLong)?;
        let v2 = v2.into_long().ok_or(EvalError::ExpectedStackValueLong)?;

        frame.stack.push(RuntimeValue::I32(ordering_value(v2.cmp(&v1))))
    }
}

/// Implement a floating point comparison, where `$nan` is pushed if either value is NaN
macro_rules! impl_float_cmp {
    ($($name:ident: $into:ident, $err:ident, $nan:expr);* $(;)?) => {
        $(
            impl RunInstContinue for $name {
                fn run(self, RunInstArgsC { frame, .. }: RunInstArgsC) -> Result<(), GeneralError> {
                    let (v1, v2) = frame.stack.pop2().ok_or(EvalError::ExpectedStackValue)?;
                    let v1 = v1.$into().ok_or(EvalError::$err)?;
                    let v2 = v2.$into().ok_or(EvalError::$err)?;

                    let value = v2.partial_cmp(&v1).map_or($nan, ordering_value);
                    frame.stack.push(RuntimeValue::I32(value))
                }
            }
        )*
    };
}

impl_float_cmp! {
    FloatCmpL: into_float, ExpectedStackValueFloat, -1;
    FloatCmpG: into_float, ExpectedStackValueFloat, 1;
    DoubleCmpL: into_double, ExpectedStackValueDouble, -1;
    DoubleCmpG: into_double, ExpectedStackValueDouble, 1;
}

// === Branches ===

/// The destination of a branch is relative to the branch instruction itself
fn branch_if(
    cond: bool,
    inst_index: InstructionIndex,
    branch_offset: i16,
) -> Result<RunInstValue, GeneralError> {
    if cond {
        let destination = util::signed_offset_16(inst_index.0, branch_offset)
            .ok_or(EvalError::BranchOverflows)?;
        let destination = InstructionIndex(destination);
        Ok(RunInstValue::ContinueAt(destination))
    } else {
        Ok(RunInstValue::Continue)
    }
}

impl RunInst for Goto {
    fn run(self, RunInstArgs { inst_index, .. }: RunInstArgs) -> Result<RunInstValue, GeneralError> {
        branch_if(true, inst_index, self.branch_offset)
    }
}

/// Implement the branches which compare the top of the stack against zero
macro_rules! impl_if_zero {
    ($($name:ident: |$v:ident| $cond:expr);* $(;)?) => {
        $(
            impl RunInst for $name {
                fn run(
                    self,
                    RunInstArgs {
                        frame, inst_index, ..
                    }: RunInstArgs,
                ) -> Result<RunInstValue, GeneralError> {
                    let $v = frame
                        .stack
                        .pop()
                        .ok_or(EvalError::ExpectedStackValue)?
                        .into_int()
                        .ok_or(EvalError::ExpectedStackValueIntRepr)?;

                    branch_if($cond, inst_index, self.branch_offset)
                }
            }
        )*
    };
}

/// Implement the branches which compare the two ints on the top of the stack.
/// `$lhs` is the value that was pushed first.
macro_rules! impl_if_icmp {
    ($($name:ident: |$lhs:ident, $rhs:ident| $cond:expr);* $(;)?) => {
        $(
            impl RunInst for $name {
                fn run(
                    self,
                    RunInstArgs {
                        frame, inst_index, ..
                    }: RunInstArgs,
                ) -> Result<RunInstValue, GeneralError> {
                    let (v1, v2) = frame.stack.pop2().ok_or(EvalError::ExpectedStackValue)?;
                    let $rhs = v1.into_int().ok_or(EvalError::ExpectedStackValueIntRepr)?;
                    let $lhs = v2.into_int().ok_or(EvalError::ExpectedStackValueIntRepr)?;

                    branch_if($cond, inst_index, self.branch_offset)
                }
            }
        )*
    };
}

impl_if_zero! {
    IfEqZero: |v| v == 0;
    IfNeZero: |v| v != 0;
    IfLtZero: |v| v < 0;
    IfGeZero: |v| v >= 0;
    IfGtZero: |v| v > 0;
    IfLeZero: |v| v <= 0;
}

impl_if_icmp! {
    IfICmpEq: |lhs, rhs| lhs == rhs;
    IfICmpNe: |lhs, rhs| lhs != rhs;
    IfICmpLt: |lhs, rhs| lhs < rhs;
    IfICmpGe: |lhs, rhs| lhs >= rhs;
    IfICmpGt: |lhs, rhs| lhs > rhs;
    IfICmpLe: |lhs, rhs| lhs <= rhs;
}

#[cfg(test)]
mod tests {
    use crate::{
        eval::{tests::run_code, EvalError},
        rv::RuntimeValue,
        GeneralError,
    };

    /// Sum the numbers from 1 to n
    /// ```text
    /// 0: iconst_0
    /// 1: istore_1
    /// 2: iload_0
    /// 3: ifle +13 (16)
    /// 6: iload_1
    /// 7: iload_0
    /// 8: iadd
    /// 9: istore_1
    /// 10: iinc 0 -1
    /// 13: goto -11 (2)
    /// 16: iload_1
    /// 17: ireturn
    /// ```
    fn sum_to(n: i32) -> Option<RuntimeValue> {
        let code = vec![
            0x03, 0x3C, 0x1A, 0x9E, 0x00, 0x0D, 0x1B, 0x1A, 0x60, 0x3C, 0x84, 0x00, 0xFF, 0xA7,
            0xFF, 0xF5, 0x1B, 0xAC,
        ];
        run_code("(I)I", 2, 2, code, &[RuntimeValue::I32(n)]).unwrap()
    }

    #[test]
    fn test_loop() {
        assert_eq!(sum_to(0), Some(RuntimeValue::I32(0)));
        assert_eq!(sum_to(1), Some(RuntimeValue::I32(1)));
        assert_eq!(sum_to(10), Some(RuntimeValue::I32(55)));
    }

    /// `lhs < rhs ? 1 : 2`, through `if_icmpge`
    /// ```text
    /// 0: iload_0
    /// 1: iload_1
    /// 2: if_icmpge +5 (7)
    /// 5: iconst_1
    /// 6: ireturn
    /// 7: iconst_2
    /// 8: ireturn
    /// ```
    fn less_than(lhs: i32, rhs: i32) -> Option<RuntimeValue> {
        let code = vec![0x1A, 0x1B, 0xA2, 0x00, 0x05, 0x04, 0xAC, 0x05, 0xAC];
        run_code(
            "(II)I",
            2,
            2,
            code,
            &[RuntimeValue::I32(lhs), RuntimeValue::I32(rhs)],
        )
        .unwrap()
    }

    #[test]
    fn test_forward_branch() {
        assert_eq!(less_than(1, 2), Some(RuntimeValue::I32(1)));
        assert_eq!(less_than(2, 2), Some(RuntimeValue::I32(2)));
        assert_eq!(less_than(3, 2), Some(RuntimeValue::I32(2)));
    }

    #[test]
    fn test_branch_overflow() {
        // goto -1 at the start of the code
        let res = run_code("()V", 0, 0, vec![0xA7, 0xFF, 0xFF], &[]);
        assert!(matches!(
            res,
            Err(GeneralError::Eval(EvalError::BranchOverflows))
        ));
    }

    /// Run a comparison instruction on two doubles
    fn dcmp(opcode: u8, lhs: f64, rhs: f64) -> Option<RuntimeValue> {
        // dload_0; dload_2; op; ireturn
        run_code(
            "(DD)I",
            4,
            4,
            vec![0x26, 0x28, opcode, 0xAC],
            &[RuntimeValue::F64(lhs), RuntimeValue::F64(rhs)],
        )
        .unwrap()
    }

    #[test]
    fn test_compare() {
        // dcmpl
        assert_eq!(dcmp(0x97, 1.0, 2.0), Some(RuntimeValue::I32(-1)));
        assert_eq!(dcmp(0x97, 2.0, 2.0), Some(RuntimeValue::I32(0)));
        assert_eq!(dcmp(0x97, 3.0, 2.0), Some(RuntimeValue::I32(1)));
        assert_eq!(dcmp(0x97, f64::NAN, 2.0), Some(RuntimeValue::I32(-1)));
        // dcmpg
        assert_eq!(dcmp(0x98, 3.0, 2.0), Some(RuntimeValue::I32(1)));
        assert_eq!(dcmp(0x98, 2.0, f64::NAN), Some(RuntimeValue::I32(1)));

        // fload_0; fload_1; fcmpl / fcmpg; ireturn
        let fcmp = |opcode: u8, lhs: f32, rhs: f32| {
            run_code(
                "(FF)I",
                2,
                2,
                vec![0x22, 0x23, opcode, 0xAC],
                &[RuntimeValue::F32(lhs), RuntimeValue::F32(rhs)],
            )
            .unwrap()
        };
        assert_eq!(fcmp(0x95, f32::NAN, f32::NAN), Some(RuntimeValue::I32(-1)));
        assert_eq!(fcmp(0x96, f32::NAN, f32::NAN), Some(RuntimeValue::I32(1)));
        assert_eq!(fcmp(0x95, -1.0, 1.0), Some(RuntimeValue::I32(-1)));

        // lload_0; lload_2; lcmp; ireturn
        let res = run_code(
            "(JJ)I",
            4,
            4,
            vec![0x1E, 0x20, 0x94, 0xAC],
            &[RuntimeValue::I64(5), RuntimeValue::I64(-5)],
        )
        .unwrap();
        assert_eq!(res, Some(RuntimeValue::I32(1)));
    }

    #[test]
    fn test_return_type() {
        // iconst_1; freturn
        let res = run_code("()F", 1, 0, vec![0x04, 0xAE], &[]);
        assert!(matches!(
            res,
            Err(GeneralError::Eval(EvalError::ExpectedStackValueFloat))
        ));
    }
}
