#![warn(clippy::pedantic)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::module_name_repetitions)]
// TODO: Re-enabling these (or at least panic docs) would be nice, but they make active development
// harder since they highlight the entire function
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
// Too error prone
#![allow(clippy::similar_names)]
// Annoying. Really shouldn't highlight the entire thing.
#![allow(clippy::unnecessary_wraps)]

use std::rc::Rc;

use brewjvm_base::{
    code::{method::MethodInfo, op_ex::InstructionParseError}, constant_pool::ConstantPoolError,
    descriptor::DescriptorError, ClassFile, ClassFileParseError,
};
use eval::{eval_method, EvalError, EvalMethodValue, Frame, Locals};
use indexmap::IndexMap;
use rv::RuntimeValue;
use usize_cast::IntoUsize;

pub mod eval;
pub mod rv;
mod util;

const ENV_TRACING_LEVEL: &str = "BREW_LOG_LEVEL";
const ENV_MAX_CALL_DEPTH: &str = "BREW_MAX_CALL_DEPTH";
const ENV_LOG_INSTRUCTIONS: &str = "BREW_LOG_INSTS";
const DEFAULT_TRACING_LEVEL: tracing::Level = tracing::Level::WARN;
pub const DEFAULT_MAX_CALL_DEPTH: usize = 512;

pub struct StateConfig {
    pub tracing_level: tracing::Level,
    /// The maximum number of method frames that may be active at once.
    /// Exceeding this fails with [`EvalError::CallDepthExceeded`] rather than overflowing the
    /// native stack.
    pub max_call_depth: usize,
    /// Whether each executed instruction is logged
    pub log_instructions: bool,
}
impl StateConfig {
    #[must_use]
    pub fn new() -> StateConfig {
        StateConfig {
            tracing_level: StateConfig::compute_tracing_level(),
            max_call_depth: StateConfig::compute_max_call_depth(),
            log_instructions: StateConfig::compute_log_instructions(),
        }
    }

    #[must_use]
    pub fn compute_tracing_level() -> tracing::Level {
        let env_log = std::env::var(ENV_TRACING_LEVEL);
        if let Ok(env_log) = env_log {
            if env_log.eq_ignore_ascii_case("trace") || env_log == "*" {
                tracing::Level::TRACE
            } else if env_log.eq_ignore_ascii_case("info") {
                tracing::Level::INFO
            } else if env_log.eq_ignore_ascii_case("warn") {
                tracing::Level::WARN
            } else if env_log.eq_ignore_ascii_case("error") {
                tracing::Level::ERROR
            } else {
                DEFAULT_TRACING_LEVEL
            }
        } else {
            DEFAULT_TRACING_LEVEL
        }
    }

    #[must_use]
    pub fn compute_max_call_depth() -> usize {
        std::env::var(ENV_MAX_CALL_DEPTH)
            .ok()
            .and_then(|depth| depth.trim().parse::<u32>().ok())
            .filter(|depth| *depth != 0)
            .map_or(DEFAULT_MAX_CALL_DEPTH, IntoUsize::into_usize)
    }

    #[must_use]
    pub fn compute_log_instructions() -> bool {
        std::env::var(ENV_LOG_INSTRUCTIONS).map_or(true, |x| x != "0")
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
#[non_exhaustive]
pub enum GeneralError {
    Parse(ClassFileParseError),
    ConstantPool(ConstantPoolError),
    Descriptor(DescriptorError),
    InstructionParse(InstructionParseError),
    Eval(EvalError),
    /// A class with this name was already registered
    DuplicateClass(String),
    /// [`Runtime::run`] was called but no registered class has a `main` method
    MissingEntryPoint,
}
impl From<ClassFileParseError> for GeneralError {
    fn from(err: ClassFileParseError) -> Self {
        Self::Parse(err)
    }
}
impl From<ConstantPoolError> for GeneralError {
    fn from(err: ConstantPoolError) -> Self {
        Self::ConstantPool(err)
    }
}
impl From<DescriptorError> for GeneralError {
    fn from(err: DescriptorError) -> Self {
        Self::Descriptor(err)
    }
}
impl From<InstructionParseError> for GeneralError {
    fn from(err: InstructionParseError) -> Self {
        Self::InstructionParse(err)
    }
}
impl From<EvalError> for GeneralError {
    fn from(err: EvalError) -> Self {
        Self::Eval(err)
    }
}

/// The set of classes available for execution, and the entry point among them
pub struct Runtime {
    pub conf: StateConfig,
    /// Classes keyed by their internal name (ex: `java/lang/Object`)
    classes: IndexMap<String, Rc<ClassFile>>,
    /// The name of the first registered class which had a `main` method
    entry_point: Option<String>,
}
impl Runtime {
    #[must_use]
    pub fn new(conf: StateConfig) -> Runtime {
        Runtime {
            conf,
            classes: IndexMap::new(),
            entry_point: None,
        }
    }

    /// Make the class available to `invokestatic`.
    /// Fails if a class with the same name was already registered.
    pub fn register(&mut self, class_file: ClassFile) -> Result<(), GeneralError> {
        let name = class_file.get_this_name()?.to_owned();
        if self.classes.contains_key(&name) {
            return Err(GeneralError::DuplicateClass(name));
        }

        if self.entry_point.is_none() && class_file.entry_point().is_some() {
            tracing::info!("Entry point found in {}", name);
            self.entry_point = Some(name.clone());
        }

        tracing::info!("Registered class {}", name);
        self.classes.insert(name, Rc::new(class_file));
        Ok(())
    }

    #[must_use]
    pub fn get_class(&self, name: &str) -> Option<&Rc<ClassFile>> {
        self.classes.get(name)
    }

    /// The names of the registered classes, in order of registration
    pub fn class_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.classes.keys().map(String::as_str)
    }

    #[must_use]
    pub fn has_entry_point(&self) -> bool {
        self.entry_point.is_some()
    }

    /// The name of the class whose `main` will be executed by [`Runtime::run`]
    #[must_use]
    pub fn entry_point_class(&self) -> Option<&str> {
        self.entry_point.as_deref()
    }

    /// Execute the entry point. The `String[]` argument is passed as null.
    pub fn run(&self) -> Result<Option<RuntimeValue>, GeneralError> {
        let class_name = self
            .entry_point
            .as_deref()
            .ok_or(GeneralError::MissingEntryPoint)?;
        let class_file = self
            .classes
            .get(class_name)
            .ok_or_else(|| EvalError::UnresolvedClass(class_name.to_owned()))?;
        let method = class_file
            .entry_point()
            .ok_or(GeneralError::MissingEntryPoint)?;

        self.invoke(class_file, method, &[RuntimeValue::Null])
    }

    /// Execute the static method `name` with the given `descriptor` in the class `class_name`,
    /// passing the values as its arguments.
    pub fn run_static(
        &self,
        class_name: &str,
        name: &str,
        descriptor: &str,
        args: &[RuntimeValue],
    ) -> Result<Option<RuntimeValue>, GeneralError> {
        let class_file = self
            .classes
            .get(class_name)
            .ok_or_else(|| EvalError::UnresolvedClass(class_name.to_owned()))?;
        let method = class_file.get_method(name, descriptor).ok_or_else(|| {
            EvalError::UnresolvedMethod {
                class_name: class_name.to_owned(),
                signature: format!("{}{}", name, descriptor),
            }
        })?;
        if !method.is_static() {
            return Err(EvalError::ExpectedStaticMethod {
                class_name: class_name.to_owned(),
                signature: method.signature(),
            }
            .into());
        }

        if method.argument_types().len() != args.len()
            || !method
                .argument_types()
                .iter()
                .zip(args)
                .all(|(desc, arg)| arg.is_of_type(desc))
        {
            return Err(EvalError::MismatchedArguments {
                signature: method.signature(),
            }
            .into());
        }

        self.invoke(class_file, method, args)
    }

    fn invoke(
        &self,
        class_file: &ClassFile,
        method: &MethodInfo,
        args: &[RuntimeValue],
    ) -> Result<Option<RuntimeValue>, GeneralError> {
        let code = method.code().ok_or_else(|| EvalError::MissingCode {
            signature: method.signature(),
        })?;

        let mut locals = Locals::default();
        for arg in args {
            locals.push_transform(*arg);
        }
        let frame = Frame::new_for_code(code, locals)?;

        match eval_method(self, class_file, method, frame, 1)? {
            EvalMethodValue::ReturnVoid => Ok(None),
            EvalMethodValue::Return(v) => Ok(Some(v)),
        }
    }
}
