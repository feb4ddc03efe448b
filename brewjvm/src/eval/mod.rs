// LocalVariableIndex seems to trip up clippy
#![allow(clippy::needless_pass_by_value)]

use brewjvm_base::{
    class::ClassFile,
    code::{
        method::MethodInfo, op::RawOpcode, op_ex::InstructionParseError, CodeInfo,
        InstructionIndex,
    },
    map_inst,
    util::MemorySize,
};

use crate::{rv::RuntimeValue, GeneralError, Runtime};

mod control_flow;
mod func;
mod operation;
mod store_load;

pub type LocalVariableIndex = u16;

#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum EvalError {
    /// The class was not registered with the runtime
    UnresolvedClass(String),
    /// The class exists but it has no method with this signature
    UnresolvedMethod {
        class_name: String,
        signature: String,
    },
    /// Only static methods can be invoked, since there are no objects
    ExpectedStaticMethod {
        class_name: String,
        signature: String,
    },
    /// The values passed to the method did not match its descriptor
    MismatchedArguments {
        signature: String,
    },
    /// The value returned did not match the return type of the method
    MismatchedReturn {
        signature: String,
    },
    /// The method has no code attribute to execute, likely because it is native or abstract
    MissingCode {
        signature: String,
    },
    /// The opcode at the instruction index is not one that can be executed
    UnsupportedInstruction {
        opcode: RawOpcode,
        pc: InstructionIndex,
    },
    /// We tried continuing but the instruction at that index was missing, likely because the code
    /// ran off its end without returning
    MissingInstruction(InstructionIndex),
    /// Only numeric constants can be loaded, since there is no heap to put strings in
    UnsupportedConstant {
        index: u16,
        kind: &'static str,
    },
    /// There were more nested method calls than allowed by the configuration
    CallDepthExceeded {
        depth: usize,
    },
    /// Integer division or remainder by zero
    DivisionByZero,

    /// Expected a value on the top of the stack (probably for popping)
    ExpectedStackValue,
    /// Expected a value that would be represented as an integer
    ExpectedStackValueIntRepr,
    /// Expected a float
    ExpectedStackValueFloat,
    /// Expected a long
    ExpectedStackValueLong,
    /// Expected a double
    ExpectedStackValueDouble,
    /// Expected a value that is category 1
    ExpectedStackValueCategory1,
    /// Pushing the value would go past the `max_stack` of the method
    StackOverflow {
        max: usize,
    },

    /// It was expected that there would be a local variable at the given index
    ExpectedLocalVariable(LocalVariableIndex),
    /// It was expected that the local variable would have a value
    ExpectedLocalVariableWithValue(LocalVariableIndex),
    /// Expected the local variable at the given index to be representable as an int
    ExpectedLocalVariableIntRepr(LocalVariableIndex),
    /// Expected the local variable at the given index to be a float
    ExpectedLocalVariableFloat(LocalVariableIndex),
    /// Expected the local variable at the given index to be a long
    ExpectedLocalVariableLong(LocalVariableIndex),
    /// Expected the local variable at the given index to be a double
    ExpectedLocalVariableDouble(LocalVariableIndex),
    /// The arguments take up more slots than the method has locals
    TooManyLocals {
        needed: usize,
        max: u16,
    },

    /// When computing branch target, the result {over,under}flowed
    BranchOverflows,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Local {
    /// The upper part of a Long/Double
    Top,
    /// No value
    Empty,
    Value(RuntimeValue),
}
impl Local {
    #[must_use]
    pub fn as_value(&self) -> Option<&RuntimeValue> {
        match self {
            Local::Value(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_value_mut(&mut self) -> Option<&mut RuntimeValue> {
        match self {
            Local::Value(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Default, Debug, Clone)]
pub struct Locals {
    locals: Vec<Local>,
}
impl Locals {
    /// Push a value onto the end of the locals, transforming it into as many slots as it needs.
    /// Because, values like Long/Double take up two indices.
    pub fn push_transform(&mut self, value: RuntimeValue) {
        let is_category_2 = value.is_category_2();
        self.locals.push(Local::Value(value));
        if is_category_2 {
            self.locals.push(Local::Top);
        }
    }

    /// Pad the locals with empty slots up to `max_locals`
    pub fn fill_to(&mut self, max_locals: u16) -> Result<(), EvalError> {
        let max = usize::from(max_locals);
        if self.locals.len() > max {
            return Err(EvalError::TooManyLocals {
                needed: self.locals.len(),
                max: max_locals,
            });
        }

        self.locals.resize(max, Local::Empty);
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.locals.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locals.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: LocalVariableIndex) -> Option<&Local> {
        self.locals.get(usize::from(index))
    }

    pub fn get_mut(&mut self, index: LocalVariableIndex) -> Option<&mut Local> {
        self.locals.get_mut(usize::from(index))
    }

    /// Get the value held in the local at the index
    pub fn get_value(&self, index: LocalVariableIndex) -> Result<RuntimeValue, EvalError> {
        self.get(index)
            .ok_or(EvalError::ExpectedLocalVariable(index))?
            .as_value()
            .copied()
            .ok_or(EvalError::ExpectedLocalVariableWithValue(index))
    }

    /// Store the value at the index. Long/Double also occupy the index after it.
    /// The locals never grow past the size they were given.
    pub fn set_value_at(
        &mut self,
        index: LocalVariableIndex,
        value: RuntimeValue,
    ) -> Result<(), EvalError> {
        let i = usize::from(index);
        let end = i + value.slot_size();
        if end > self.locals.len() {
            return Err(EvalError::ExpectedLocalVariable(index));
        }

        // Writing over the upper half of a long/double invalidates it
        if let Some(Local::Top) = self.locals.get(i) {
            if let Some(prev) = i.checked_sub(1) {
                self.locals[prev] = Local::Empty;
            }
        }
        // As does writing over the lower half of one, if this value doesn't cover the upper half
        if let Some(Local::Top) = self.locals.get(end) {
            self.locals[end] = Local::Empty;
        }

        self.locals[i] = Local::Value(value);
        if value.is_category_2() {
            self.locals[i + 1] = Local::Top;
        }

        Ok(())
    }
}

/// The operand stack of a frame.
/// Long and Double count as two units against the maximum, like they do in `max_stack`.
#[derive(Debug, Clone)]
pub struct Stack {
    stack: Vec<RuntimeValue>,
    /// The number of units currently in use
    used: usize,
    max: usize,
}
impl Stack {
    #[must_use]
    pub fn new(max_stack: u16) -> Stack {
        Stack {
            stack: Vec::with_capacity(usize::from(max_stack)),
            used: 0,
            max: usize::from(max_stack),
        }
    }

    pub fn push(&mut self, value: impl Into<RuntimeValue>) -> Result<(), GeneralError> {
        let value = value.into();
        let used = self.used + value.slot_size();
        if used > self.max {
            return Err(EvalError::StackOverflow { max: self.max }.into());
        }

        self.used = used;
        self.stack.push(value);
        Ok(())
    }

    pub fn pop(&mut self) -> Option<RuntimeValue> {
        let value = self.stack.pop()?;
        self.used -= value.slot_size();
        Some(value)
    }

    /// Pop 2 values at once, returning None if either of them don't exist
    /// The first value is the one that was on the top of the stack
    pub fn pop2(&mut self) -> Option<(RuntimeValue, RuntimeValue)> {
        if self.stack.len() < 2 {
            return None;
        }

        let v1 = self.pop()?;
        self.pop().map(|v2| (v1, v2))
    }

    #[must_use]
    pub fn peek(&self) -> Option<&RuntimeValue> {
        self.stack.last()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stack.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Frame {
    pub stack: Stack,
    pub locals: Locals,
}
impl Frame {
    /// Create a frame for executing the code, with the locals already holding the arguments
    pub fn new_for_code(code: &CodeInfo, mut locals: Locals) -> Result<Frame, EvalError> {
        locals.fill_to(code.max_locals())?;
        Ok(Frame {
            stack: Stack::new(code.max_stack()),
            locals,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EvalMethodValue {
    /// We returned nothing
    ReturnVoid,
    /// We returned this value
    Return(RuntimeValue),
}

/// Execute the method, which belongs to `class_file`, until it returns.
/// `depth` is the number of frames that are active including this one.
pub fn eval_method(
    runtime: &Runtime,
    class_file: &ClassFile,
    method: &MethodInfo,
    mut frame: Frame,
    depth: usize,
) -> Result<EvalMethodValue, GeneralError> {
    if depth > runtime.conf.max_call_depth {
        return Err(EvalError::CallDepthExceeded { depth }.into());
    }

    let code = method.code().ok_or_else(|| EvalError::MissingCode {
        signature: method.signature(),
    })?;

    let span = tracing::span!(tracing::Level::INFO, "eval_method", depth);
    let _guard = span.enter();

    tracing::info!(
        "Executing Method: {}::{}{}",
        class_file.get_this_name()?,
        method.name(),
        method.descriptor()
    );

    let mut pc = InstructionIndex(0);

    loop {
        let inst = code.instruction_at(pc).map_err(|err| match err {
            InstructionParseError::UnknownOpcode { idx, opcode } => {
                GeneralError::Eval(EvalError::UnsupportedInstruction { opcode, pc: idx })
            }
            InstructionParseError::ExpectedOpCodeAt(idx) => {
                GeneralError::Eval(EvalError::MissingInstruction(idx))
            }
            err => GeneralError::InstructionParse(err),
        })?;
        // Instructions are at most a handful of bytes
        #[allow(clippy::cast_possible_truncation)]
        let size = inst.memory_size() as u16;

        if runtime.conf.log_instructions {
            tracing::info!("# ({}) {:?}", pc.0, inst);
        }

        let args = RunInstArgs {
            runtime,
            class_file,
            frame: &mut frame,
            inst_index: pc,
            depth,
        };

        let res = map_inst!(inst; x; RunInst::run(x, args))?;

        match res {
            RunInstValue::Continue => {
                pc.0 = pc
                    .0
                    .checked_add(size)
                    .ok_or(EvalError::MissingInstruction(pc))?;
            }
            RunInstValue::ContinueAt(i) => pc = i,
            RunInstValue::ReturnVoid => {
                if !method.return_type().is_void() {
                    return Err(EvalError::MismatchedReturn {
                        signature: method.signature(),
                    }
                    .into());
                }

                return Ok(EvalMethodValue::ReturnVoid);
            }
            RunInstValue::Return(x) => {
                if !x.is_of_type(method.return_type()) {
                    return Err(EvalError::MismatchedReturn {
                        signature: method.signature(),
                    }
                    .into());
                }

                return Ok(EvalMethodValue::Return(x));
            }
        }
    }
}

#[derive(Debug, Clone)]
pub enum RunInstValue {
    /// We returned nothing
    ReturnVoid,
    /// We returned with a value
    Return(RuntimeValue),
    /// Continue executing to the next instruction
    Continue,
    /// Continue executing at a specific instruction
    /// (such as, due to a goto)
    ContinueAt(InstructionIndex),
}

pub struct RunInstArgs<'r, 'f> {
    pub runtime: &'r Runtime,
    /// The class which holds the executing method, whose constant pool indices refer to
    pub class_file: &'r ClassFile,
    pub frame: &'f mut Frame,
    /// Index into 'bytes' of instructions, which is more commonly used in code
    pub inst_index: InstructionIndex,
    pub depth: usize,
}
/// [`RunInstArgs`] but with only what instructions which never transfer control need
pub struct RunInstArgsC<'r, 'f> {
    pub class_file: &'r ClassFile,
    pub frame: &'f mut Frame,
}

pub trait RunInst {
    fn run(self, args: RunInstArgs) -> Result<RunInstValue, GeneralError>;
}

/// RunInst but it merely continues to the next instruction or returns an error
pub trait RunInstContinue {
    fn run(self, args: RunInstArgsC) -> Result<(), GeneralError>;
}

impl<T: RunInstContinue> RunInst for T {
    fn run(self, args: RunInstArgs) -> Result<RunInstValue, GeneralError> {
        <T as RunInstContinue>::run(
            self,
            RunInstArgsC {
                class_file: args.class_file,
                frame: args.frame,
            },
        )?;
        Ok(RunInstValue::Continue)
    }
}
