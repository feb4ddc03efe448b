use brewjvm_base::{
    class::ClassFile,
    code::op::{
        AConstNull, DoubleConst0, DoubleConst1, DoubleLoad, DoubleLoad0, DoubleLoad1, DoubleLoad2,
        DoubleLoad3, DoubleStore, DoubleStore0, DoubleStore1, DoubleStore2, DoubleStore3, Dup,
        FloatConst0, FloatConst1, FloatConst2, FloatLoad, FloatLoad0, FloatLoad1, FloatLoad2,
        FloatLoad3, FloatStore, FloatStore0, FloatStore1, FloatStore2, FloatStore3, IConstNeg1,
        IntConst0, IntConst1, IntConst2, IntConst3, IntConst4, IntConst5, IntLoad, IntLoad0,
        IntLoad1, IntLoad2, IntLoad3, IntStore, IntStore0, IntStore1, IntStore2, IntStore3,
        LoadConstant, LoadConstant2Wide, LoadConstantWide, LongConst0, LongConst1, LongLoad,
        LongLoad0, LongLoad1, LongLoad2, LongLoad3, LongStore, LongStore0, LongStore1, LongStore2,
        LongStore3, Nop, Pop, Pop2, PushByte, PushShort,
    },
    constant_pool::{ConstantInfo, ConstantPoolIndexRaw},
};

use crate::{eval::EvalError, rv::RuntimeValue, GeneralError};

use super::{Frame, LocalVariableIndex, RunInstArgsC, RunInstContinue};

impl RunInstContinue for Nop {
    fn run(self, _: RunInstArgsC) -> Result<(), GeneralError> {
        Ok(())
    }
}

// === Constants ===

macro_rules! impl_push_constant {
    ($($name:ident => $value:expr),* $(,)?) => {
        $(
            impl RunInstContinue for $name {
                fn run(self, RunInstArgsC { frame, .. }: RunInstArgsC) -> Result<(), GeneralError> {
                    frame.stack.push($value)
                }
            }
        )*
    };
}

impl_push_constant!(
    AConstNull => RuntimeValue::Null,
    IConstNeg1 => RuntimeValue::I32(-1),
    IntConst0 => RuntimeValue::I32(0),
    IntConst1 => RuntimeValue::I32(1),
    IntConst2 => RuntimeValue::I32(2),
    IntConst3 => RuntimeValue::I32(3),
    IntConst4 => RuntimeValue::I32(4),
    IntConst5 => RuntimeValue::I32(5),
    LongConst0 => RuntimeValue::I64(0),
    LongConst1 => RuntimeValue::I64(1),
    FloatConst0 => RuntimeValue::F32(0.0),
    FloatConst1 => RuntimeValue::F32(1.0),
    FloatConst2 => RuntimeValue::F32(2.0),
    DoubleConst0 => RuntimeValue::F64(0.0),
    DoubleConst1 => RuntimeValue::F64(1.0),
);

impl RunInstContinue for PushByte {
    fn run(self, RunInstArgsC { frame, .. }: RunInstArgsC) -> Result<(), GeneralError> {
        frame.stack.push(RuntimeValue::I32(i32::from(self.val)))
    }
}
impl RunInstContinue for PushShort {
    fn run(self, RunInstArgsC { frame, .. }: RunInstArgsC) -> Result<(), GeneralError> {
        frame.stack.push(RuntimeValue::I32(i32::from(self.val)))
    }
}

/// Load a single slot constant (int/float) from the constant pool
fn load_constant(
    class_file: &ClassFile,
    frame: &mut Frame,
    index: ConstantPoolIndexRaw<ConstantInfo>,
) -> Result<(), GeneralError> {
    let info = class_file.constant_pool().get_t(index)?;
    let value = match info {
        ConstantInfo::Integer(x) => RuntimeValue::I32(x.value),
        ConstantInfo::Float(x) => RuntimeValue::F32(x.value),
        _ => {
            return Err(EvalError::UnsupportedConstant {
                index: index.0,
                kind: info.name(),
            }
            .into())
        }
    };

    frame.stack.push(value)
}

impl RunInstContinue for LoadConstant {
    fn run(
        self,
        RunInstArgsC { class_file, frame }: RunInstArgsC,
    ) -> Result<(), GeneralError> {
        load_constant(
            class_file,
            frame,
            ConstantPoolIndexRaw::new(u16::from(self.index)),
        )
    }
}
impl RunInstContinue for LoadConstantWide {
    fn run(
        self,
        RunInstArgsC { class_file, frame }: RunInstArgsC,
    ) -> Result<(), GeneralError> {
        load_constant(class_file, frame, self.index)
    }
}
impl RunInstContinue for LoadConstant2Wide {
    fn run(
        self,
        RunInstArgsC { class_file, frame }: RunInstArgsC,
    ) -> Result<(), GeneralError> {
        let info = class_file.constant_pool().get_t(self.index)?;
        let value = match info {
            ConstantInfo::Long(x) => RuntimeValue::I64(x.value),
            ConstantInfo::Double(x) => RuntimeValue::F64(x.value),
            _ => {
                return Err(EvalError::UnsupportedConstant {
                    index: self.index.0,
                    kind: info.name(),
                }
                .into())
            }
        };

        frame.stack.push(value)
    }
}

// === Load ===

fn intload_index(frame: &mut Frame, index: LocalVariableIndex) -> Result<(), GeneralError> {
    let value = frame
        .locals
        .get_value(index)?
        .into_int()
        .ok_or(EvalError::ExpectedLocalVariableIntRepr(index))?;
    frame.stack.push(RuntimeValue::I32(value))
}

fn longload_index(frame: &mut Frame, index: LocalVariableIndex) -> Result<(), GeneralError> {
    let value = frame
        .locals
        .get_value(index)?
        .into_long()
        .ok_or(EvalError::ExpectedLocalVariableLong(index))?;
    frame.stack.push(RuntimeValue::I64(value))
}

fn floatload_index(frame: &mut Frame, index: LocalVariableIndex) -> Result<(), GeneralError> {
    let value = frame
        .locals
        .get_value(index)?
        .into_float()
        .ok_or(EvalError::ExpectedLocalVariableFloat(index))?;
    frame.stack.push(RuntimeValue::F32(value))
}

fn doubleload_index(frame: &mut Frame, index: LocalVariableIndex) -> Result<(), GeneralError> {
    let value = frame
        .locals
        .get_value(index)?
        .into_double()
        .ok_or(EvalError::ExpectedLocalVariableDouble(index))?;
    frame.stack.push(RuntimeValue::F64(value))
}

// === Store ===

fn intstore_index(frame: &mut Frame, index: LocalVariableIndex) -> Result<(), GeneralError> {
    let value = frame.stack.pop().ok_or(EvalError::ExpectedStackValue)?;
    let value = value
        .into_int()
        .ok_or(EvalError::ExpectedStackValueIntRepr)?;
    frame.locals.set_value_at(index, RuntimeValue::I32(value))?;
    Ok(())
}

fn longstore_index(frame: &mut Frame, index: LocalVariableIndex) -> Result<(), GeneralError> {
    let value = frame.stack.pop().ok_or(EvalError::ExpectedStackValue)?;
    let value = value.into_long().ok_or(EvalError::ExpectedStackValueLong)?;
    frame.locals.set_value_at(index, RuntimeValue::I64(value))?;
    Ok(())
}

fn floatstore_index(frame: &mut Frame, index: LocalVariableIndex) -> Result<(), GeneralError> {
    let value = frame.stack.pop().ok_or(EvalError::ExpectedStackValue)?;
    let value = value
        .into_float()
        .ok_or(EvalError::ExpectedStackValueFloat)?;
    frame.locals.set_value_at(index, RuntimeValue::F32(value))?;
    Ok(())
}

fn doublestore_index(frame: &mut Frame, index: LocalVariableIndex) -> Result<(), GeneralError> {
    let value = frame.stack.pop().ok_or(EvalError::ExpectedStackValue)?;
    let value = value
        .into_double()
        .ok_or(EvalError::ExpectedStackValueDouble)?;
    frame.locals.set_value_at(index, RuntimeValue::F64(value))?;
    Ok(())
}

/// Implement the instructions which take their local index from their operand
macro_rules! impl_local_indexed {
    ($($name:ident => $func:ident),* $(,)?) => {
        $(
            impl RunInstContinue for $name {
                fn run(self, RunInstArgsC { frame, .. }: RunInstArgsC) -> Result<(), GeneralError> {
                    $func(frame, LocalVariableIndex::from(self.index))
                }
            }
        )*
    };
}

/// Implement the instructions which have their local index as part of the opcode
macro_rules! impl_local_fixed {
    ($($name:ident => $func:ident($index:expr)),* $(,)?) => {
        $(
            impl RunInstContinue for $name {
                fn run(self, RunInstArgsC { frame, .. }: RunInstArgsC) -> Result<(), GeneralError> {
                    $func(frame, $index)
                }
            }
        )*
    };
}

impl_local_indexed!(
    IntLoad => intload_index,
    LongLoad => longload_index,
    FloatLoad => floatload_index,
    DoubleLoad => doubleload_index,
    IntStore => intstore_index,
    LongStore => longstore_index,
    FloatStore => floatstore_index,
    DoubleStore => doublestore_index,
);

impl_local_fixed!(
    IntLoad0 => intload_index(0),
    IntLoad1 => intload_index(1),
    IntLoad2 => intload_index(2),
    IntLoad3 => intload_index(3),
    LongLoad0 => longload_index(0),
    LongLoad1 => longload_index(1),
    LongLoad2 => longload_index(2),
    LongLoad3 => longload_index(3),
    FloatLoad0 => floatload_index(0),
    FloatLoad1 => floatload_index(1),
    FloatLoad2 => floatload_index(2),
    FloatLoad3 => floatload_index(3),
    DoubleLoad0 => doubleload_index(0),
    DoubleLoad1 => doubleload_index(1),
    DoubleLoad2 => doubleload_index(2),
    DoubleLoad3 => doubleload_index(3),
    IntStore0 => intstore_index(0),
    IntStore1 => intstore_index(1),
    IntStore2 => intstore_index(2),
    IntStore3 => intstore_index(3),
    LongStore0 => longstore_index(0),
    LongStore1 => longstore_index(1),
    LongStore2 => longstore_index(2),
    LongStore3 => longstore_index(3),
    FloatStore0 => floatstore_index(0),
    FloatStore1 => floatstore_index(1),
    FloatStore2 => floatstore_index(2),
    FloatStore3 => floatstore_index(3),
    DoubleStore0 => doublestore_index(0),
    DoubleStore1 => doublestore_index(1),
    DoubleStore2 => doublestore_index(2),
    DoubleStore3 => doublestore_index(3),
);

// === Stack ===

impl RunInstContinue for Pop {
    fn run(self, RunInstArgsC { frame, .. }: RunInstArgsC) -> Result<(), GeneralError> {
        let value = frame.stack.pop().ok_or(EvalError::ExpectedStackValue)?;
        if value.is_category_2() {
            return Err(EvalError::ExpectedStackValueCategory1.into());
        }

        Ok(())
    }
}
impl RunInstContinue for Pop2 {
    fn run(self, RunInstArgsC { frame, .. }: RunInstArgsC) -> Result<(), GeneralError> {
        // Either a single category 2 value or two category 1 values
        let value = frame.stack.pop().ok_or(EvalError::ExpectedStackValue)?;
        if !value.is_category_2() {
            let value = frame.stack.pop().ok_or(EvalError::ExpectedStackValue)?;
            if value.is_category_2() {
                return Err(EvalError::ExpectedStackValueCategory1.into());
            }
        }

        Ok(())
    }
}
impl RunInstContinue for Dup {
    fn run(self, RunInstArgsC { frame, .. }: RunInstArgsC) -> Result<(), GeneralError> {
        let value = *frame.stack.peek().ok_or(EvalError::ExpectedStackValue)?;
        if value.is_category_2() {
            return Err(EvalError::ExpectedStackValueCategory1.into());
        }

        frame.stack.push(value)
    }
}

#[cfg(test)]
mod tests {
    use brewjvm_base::{
        code::method::MethodAccessFlags,
        writer::{ClassBuilder, CodeBuilder},
    };

    use crate::{
        eval::{
            tests::{parse, run_code, test_config},
            EvalError,
        },
        rv::RuntimeValue,
        GeneralError, Runtime,
    };

    #[test]
    fn test_push() {
        // bipush -5; ireturn
        let res = run_code("()I", 1, 0, vec![0x10, 0xFB, 0xAC], &[]).unwrap();
        assert_eq!(res, Some(RuntimeValue::I32(-5)));
        // sipush -300; ireturn
        let res = run_code("()I", 1, 0, vec![0x11, 0xFE, 0xD4, 0xAC], &[]).unwrap();
        assert_eq!(res, Some(RuntimeValue::I32(-300)));
        // nop; iconst_m1; ireturn
        let res = run_code("()I", 1, 0, vec![0x00, 0x02, 0xAC], &[]).unwrap();
        assert_eq!(res, Some(RuntimeValue::I32(-1)));
        // dconst_1; dreturn
        let res = run_code("()D", 2, 0, vec![0x0F, 0xAF], &[]).unwrap();
        assert_eq!(res, Some(RuntimeValue::F64(1.0)));
    }

    /// Build a class whose `run` method loads the constant through `code`, where the constant's
    /// index is written by `code_for`
    fn run_with_constant(
        desc: &str,
        add: impl FnOnce(&mut ClassBuilder) -> u16,
        code_for: impl FnOnce(u16) -> Vec<u8>,
    ) -> Result<Option<RuntimeValue>, GeneralError> {
        let mut class = ClassBuilder::new("Test", Some("java/lang/Object"));
        let index = add(&mut class);
        class.method(
            MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
            "run",
            desc,
            Some(CodeBuilder::new(2, 0, code_for(index))),
        );
        let mut runtime = Runtime::new(test_config());
        runtime.register(parse(class)).unwrap();
        runtime.run_static("Test", "run", desc, &[])
    }

    #[test]
    fn test_load_constant() {
        // ldc; ireturn
        let res = run_with_constant(
            "()I",
            |class| class.pool().integer(123_456),
            |index| vec![0x12, index as u8, 0xAC],
        )
        .unwrap();
        assert_eq!(res, Some(RuntimeValue::I32(123_456)));

        // ldc_w; freturn
        let res = run_with_constant(
            "()F",
            |class| class.pool().float(1.5),
            |index| {
                let [a, b] = index.to_be_bytes();
                vec![0x13, a, b, 0xAE]
            },
        )
        .unwrap();
        assert_eq!(res, Some(RuntimeValue::F32(1.5)));

        // ldc2_w; lreturn
        let res = run_with_constant(
            "()J",
            |class| class.pool().long(-9_000_000_000),
            |index| {
                let [a, b] = index.to_be_bytes();
                vec![0x14, a, b, 0xAD]
            },
        )
        .unwrap();
        assert_eq!(res, Some(RuntimeValue::I64(-9_000_000_000)));

        // ldc2_w; dreturn
        let res = run_with_constant(
            "()D",
            |class| class.pool().double(0.25),
            |index| {
                let [a, b] = index.to_be_bytes();
                vec![0x14, a, b, 0xAF]
            },
        )
        .unwrap();
        assert_eq!(res, Some(RuntimeValue::F64(0.25)));
    }

    #[test]
    fn test_load_constant_string() {
        // ldc of a string is never supported
        let res = run_with_constant(
            "()V",
            |class| class.pool().string("hello"),
            |index| vec![0x12, index as u8, 0x57, 0xB1],
        );
        assert!(matches!(
            res,
            Err(GeneralError::Eval(EvalError::UnsupportedConstant {
                kind: "String",
                ..
            }))
        ));

        // ldc of a long must use ldc2_w
        let res = run_with_constant(
            "()V",
            |class| class.pool().long(1),
            |index| vec![0x12, index as u8, 0x57, 0xB1],
        );
        assert!(matches!(
            res,
            Err(GeneralError::Eval(EvalError::UnsupportedConstant { kind: "Long", .. }))
        ));
    }

    #[test]
    fn test_locals() {
        // iload_0; iload_1; iadd; istore_2; iload_2; ireturn
        let res = run_code(
            "(II)I",
            2,
            3,
            vec![0x1A, 0x1B, 0x60, 0x3D, 0x1C, 0xAC],
            &[RuntimeValue::I32(3), RuntimeValue::I32(4)],
        )
        .unwrap();
        assert_eq!(res, Some(RuntimeValue::I32(7)));

        // The long takes slots 0 and 1, so the int is at 2
        // lload_0; lstore 3; iload_2; pop; lload 3; lreturn
        let res = run_code(
            "(JI)J",
            2,
            5,
            vec![0x1E, 0x37, 0x03, 0x1C, 0x57, 0x16, 0x03, 0xAD],
            &[RuntimeValue::I64(1 << 40), RuntimeValue::I32(9)],
        )
        .unwrap();
        assert_eq!(res, Some(RuntimeValue::I64(1 << 40)));

        // fload_0; fstore_1; fload_1; freturn
        let res = run_code(
            "(F)F",
            1,
            2,
            vec![0x22, 0x44, 0x23, 0xAE],
            &[RuntimeValue::F32(2.5)],
        )
        .unwrap();
        assert_eq!(res, Some(RuntimeValue::F32(2.5)));

        // dload_0; dstore_2; dload_2; dreturn
        let res = run_code(
            "(D)D",
            2,
            4,
            vec![0x26, 0x49, 0x28, 0xAF],
            &[RuntimeValue::F64(-2.5)],
        )
        .unwrap();
        assert_eq!(res, Some(RuntimeValue::F64(-2.5)));
    }

    #[test]
    fn test_locals_errors() {
        // iload_1 of a method with one local
        let res = run_code("(I)I", 1, 1, vec![0x1B, 0xAC], &[RuntimeValue::I32(0)]);
        assert!(matches!(
            res,
            Err(GeneralError::Eval(EvalError::ExpectedLocalVariable(1)))
        ));

        // iload_1 where the local was never stored
        let res = run_code("(I)I", 1, 2, vec![0x1B, 0xAC], &[RuntimeValue::I32(0)]);
        assert!(matches!(
            res,
            Err(GeneralError::Eval(EvalError::ExpectedLocalVariableWithValue(1)))
        ));

        // fload_0 of an int
        let res = run_code("(I)F", 1, 1, vec![0x22, 0xAE], &[RuntimeValue::I32(0)]);
        assert!(matches!(
            res,
            Err(GeneralError::Eval(EvalError::ExpectedLocalVariableFloat(0)))
        ));

        // iload_1 of the upper half of a long
        let res = run_code("(J)I", 1, 2, vec![0x1B, 0xAC], &[RuntimeValue::I64(0)]);
        assert!(matches!(
            res,
            Err(GeneralError::Eval(EvalError::ExpectedLocalVariableWithValue(1)))
        ));

        // istore_0 of a float
        let res = run_code("()V", 1, 1, vec![0x0B, 0x3B, 0xB1], &[]);
        assert!(matches!(
            res,
            Err(GeneralError::Eval(EvalError::ExpectedStackValueIntRepr))
        ));
    }

    #[test]
    fn test_stack_ops() {
        // iconst_2; dup; imul; ireturn
        let res = run_code("()I", 2, 0, vec![0x05, 0x59, 0x68, 0xAC], &[]).unwrap();
        assert_eq!(res, Some(RuntimeValue::I32(4)));

        // iconst_1; lconst_1; pop2; ireturn
        let res = run_code("()I", 3, 0, vec![0x04, 0x0A, 0x58, 0xAC], &[]).unwrap();
        assert_eq!(res, Some(RuntimeValue::I32(1)));

        // iconst_1; iconst_2; iconst_3; pop2; ireturn
        let res = run_code("()I", 3, 0, vec![0x04, 0x05, 0x06, 0x58, 0xAC], &[]).unwrap();
        assert_eq!(res, Some(RuntimeValue::I32(1)));

        // lconst_1; pop
        let res = run_code("()V", 2, 0, vec![0x0A, 0x57, 0xB1], &[]);
        assert!(matches!(
            res,
            Err(GeneralError::Eval(EvalError::ExpectedStackValueCategory1))
        ));

        // pop with nothing on the stack
        let res = run_code("()V", 1, 0, vec![0x57, 0xB1], &[]);
        assert!(matches!(
            res,
            Err(GeneralError::Eval(EvalError::ExpectedStackValue))
        ));
    }
}
