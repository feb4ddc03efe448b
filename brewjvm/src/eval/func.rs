use brewjvm_base::{
    code::op::InvokeStatic,
    constant_pool::{ConstantInfo, ConstantPoolError},
};
use smallvec::SmallVec;

use crate::{eval::EvalError, rv::RuntimeValue, GeneralError};

use super::{eval_method, EvalMethodValue, Frame, Locals, RunInst, RunInstArgs, RunInstValue};

impl RunInst for InvokeStatic {
    fn run(
        self,
        RunInstArgs {
            runtime,
            class_file,
            frame,
            depth,
            ..
        }: RunInstArgs,
    ) -> Result<RunInstValue, GeneralError> {
        let pool = class_file.constant_pool();

        // Static methods can also be on interfaces
        let (class_index, name_and_type_index) = match pool.get_t(self.index)? {
            ConstantInfo::MethodRef(method) => (method.class_index, method.name_and_type_index),
            ConstantInfo::InterfaceMethodRef(method) => {
                (method.class_index, method.name_and_type_index)
            }
            info => {
                return Err(ConstantPoolError::IncorrectType {
                    index: self.index.0,
                    expected: "MethodRef",
                    found: info.name(),
                }
                .into())
            }
        };

        let target_class_name = pool.get_class_name(class_index)?;
        let (name, descriptor) = pool.get_name_and_type(name_and_type_index)?;

        let target_class = runtime
            .get_class(target_class_name)
            .ok_or_else(|| EvalError::UnresolvedClass(target_class_name.to_owned()))?;
        let method = target_class.get_method(name, descriptor).ok_or_else(|| {
            EvalError::UnresolvedMethod {
                class_name: target_class_name.to_owned(),
                signature: format!("{}{}", name, descriptor),
            }
        })?;
        if !method.is_static() {
            return Err(EvalError::ExpectedStaticMethod {
                class_name: target_class_name.to_owned(),
                signature: method.signature(),
            }
            .into());
        }

        let code = method.code().ok_or_else(|| EvalError::MissingCode {
            signature: method.signature(),
        })?;

        // The last argument is on the top of the stack
        let mut args: SmallVec<[RuntimeValue; 8]> = SmallVec::new();
        for arg_type in method.argument_types().iter().rev() {
            let value = frame.stack.pop().ok_or(EvalError::ExpectedStackValue)?;
            if !value.is_of_type(arg_type) {
                return Err(EvalError::MismatchedArguments {
                    signature: method.signature(),
                }
                .into());
            }
            args.push(value);
        }

        let mut locals = Locals::default();
        for arg in args.into_iter().rev() {
            locals.push_transform(arg);
        }
        let callee_frame = Frame::new_for_code(code, locals)?;

        match eval_method(runtime, target_class, method, callee_frame, depth + 1)? {
            EvalMethodValue::ReturnVoid => {}
            EvalMethodValue::Return(value) => frame.stack.push(value)?,
        }

        Ok(RunInstValue::Continue)
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
            tests::{parse, test_config},
            EvalError,
        },
        rv::RuntimeValue,
        GeneralError, Runtime,
    };

    fn public_static() -> MethodAccessFlags {
        MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC
    }

    fn invoke(index: u16) -> [u8; 3] {
        let [a, b] = index.to_be_bytes();
        [0xB8, a, b]
    }

    /// `Math.combine(int a, long b, int c)` returns `a * 100 + b * 10 + c`, which shows the
    /// arguments arrived in order
    fn math_class() -> ClassBuilder {
        let mut math = ClassBuilder::new("util/Math", Some("java/lang/Object"));
        // iload_0; bipush 100; imul; i2l; lload_1; ldc2_w 10; lmul; ladd; iload_3; i2l; ladd;
        // l2i; ireturn
        let ten = math.pool().long(10);
        let [a, b] = ten.to_be_bytes();
        math.method(
            public_static(),
            "combine",
            "(IJI)I",
            Some(CodeBuilder::new(
                6,
                4,
                vec![
                    0x1A, 0x10, 100, 0x68, 0x85, 0x1F, 0x14, a, b, 0x69, 0x61, 0x1D, 0x85, 0x61,
                    0x88, 0xAC,
                ],
            )),
        );
        math
    }

    #[test]
    fn test_invoke_static() {
        let mut main = ClassBuilder::new("Main", Some("java/lang/Object"));
        let combine = main.pool().method_ref("util/Math", "combine", "(IJI)I");
        // iconst_1; lconst_1; iconst_3; invokestatic; iconst_1; iadd; ireturn
        let mut code = vec![0x04, 0x0A, 0x06];
        code.extend(invoke(combine));
        code.extend([0x04, 0x60, 0xAC]);
        main.method(
            public_static(),
            "run",
            "()I",
            Some(CodeBuilder::new(4, 0, code)),
        );

        let mut runtime = Runtime::new(test_config());
        runtime.register(parse(main)).unwrap();
        runtime.register(parse(math_class())).unwrap();

        let res = runtime.run_static("Main", "run", "()I", &[]).unwrap();
        // 1 * 100 + 1 * 10 + 3, and then the caller adds 1
        assert_eq!(res, Some(RuntimeValue::I32(114)));
    }

    #[test]
    fn test_invoke_interface_static() {
        let mut main = ClassBuilder::new("Main", Some("java/lang/Object"));
        let target = main
            .pool()
            .interface_method_ref("Main", "seven", "()I");
        let mut code = invoke(target).to_vec();
        code.push(0xAC);
        main.method(public_static(), "run", "()I", Some(CodeBuilder::new(1, 0, code)));
        // bipush 7; ireturn
        main.method(
            public_static(),
            "seven",
            "()I",
            Some(CodeBuilder::new(1, 0, vec![0x10, 7, 0xAC])),
        );

        let mut runtime = Runtime::new(test_config());
        runtime.register(parse(main)).unwrap();
        let res = runtime.run_static("Main", "run", "()I", &[]).unwrap();
        assert_eq!(res, Some(RuntimeValue::I32(7)));
    }

    fn run_call_to(
        class_name: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<Option<RuntimeValue>, GeneralError> {
        let mut main = ClassBuilder::new("Main", Some("java/lang/Object"));
        let target = main.pool().method_ref(class_name, name, descriptor);
        let mut code = invoke(target).to_vec();
        code.push(0xB1);
        main.method(public_static(), "run", "()V", Some(CodeBuilder::new(4, 0, code)));
        main.method(
            MethodAccessFlags::PUBLIC,
            "instance",
            "()V",
            Some(CodeBuilder::new(0, 1, vec![0xB1])),
        );
        main.method(
            public_static() | MethodAccessFlags::NATIVE,
            "native",
            "()V",
            None,
        );

        let mut runtime = Runtime::new(test_config());
        runtime.register(parse(main)).unwrap();
        runtime.run_static("Main", "run", "()V", &[])
    }

    #[test]
    fn test_unresolved() {
        let res = run_call_to("java/lang/Math", "abs", "(I)I");
        assert!(matches!(
            res,
            Err(GeneralError::Eval(EvalError::UnresolvedClass(name))) if name == "java/lang/Math"
        ));

        let res = run_call_to("Main", "abs", "(I)I");
        assert!(matches!(
            res,
            Err(GeneralError::Eval(EvalError::UnresolvedMethod { class_name, signature }))
                if class_name == "Main" && signature == "abs(I)I"
        ));

        let res = run_call_to("Main", "instance", "()V");
        assert!(matches!(
            res,
            Err(GeneralError::Eval(EvalError::ExpectedStaticMethod { .. }))
        ));

        let res = run_call_to("Main", "native", "()V");
        assert!(matches!(
            res,
            Err(GeneralError::Eval(EvalError::MissingCode { .. }))
        ));

        // Not enough arguments on the stack
        let mut runtime = Runtime::new(test_config());
        runtime.register(parse(math_class())).unwrap();
        let mut main = ClassBuilder::new("Main", Some("java/lang/Object"));
        let combine = main.pool().method_ref("util/Math", "combine", "(IJI)I");
        let mut code = vec![0x04];
        code.extend(invoke(combine));
        code.push(0xAC);
        main.method(public_static(), "run", "()I", Some(CodeBuilder::new(1, 0, code)));
        runtime.register(parse(main)).unwrap();
        let res = runtime.run_static("Main", "run", "()I", &[]);
        assert!(matches!(
            res,
            Err(GeneralError::Eval(EvalError::ExpectedStackValue))
        ));
    }

    #[test]
    fn test_invoke_wrong_constant() {
        let mut main = ClassBuilder::new("Main", Some("java/lang/Object"));
        let index = main.pool().integer(4);
        let mut code = invoke(index).to_vec();
        code.push(0xB1);
        main.method(public_static(), "run", "()V", Some(CodeBuilder::new(0, 0, code)));

        let mut runtime = Runtime::new(test_config());
        runtime.register(parse(main)).unwrap();
        let res = runtime.run_static("Main", "run", "()V", &[]);
        assert!(matches!(
            res,
            Err(GeneralError::ConstantPool(
                brewjvm_base::constant_pool::ConstantPoolError::IncorrectType {
                    expected: "MethodRef",
                    found: "Integer",
                    ..
                }
            ))
        ));
    }

    #[test]
    fn test_call_depth() {
        // A method which calls itself forever
        let mut main = ClassBuilder::new("Main", Some("java/lang/Object"));
        let this = main.pool().method_ref("Main", "forever", "()V");
        let mut code = invoke(this).to_vec();
        code.push(0xB1);
        main.method(
            public_static(),
            "forever",
            "()V",
            Some(CodeBuilder::new(0, 0, code)),
        );

        let mut runtime = Runtime::new(test_config());
        let max = runtime.conf.max_call_depth;
        runtime.register(parse(main)).unwrap();
        let res = runtime.run_static("Main", "forever", "()V", &[]);
        assert!(matches!(
            res,
            Err(GeneralError::Eval(EvalError::CallDepthExceeded { depth })) if depth == max + 1
        ));
    }

    #[test]
    fn test_recursion() {
        // fib(n) = n < 2 ? n : fib(n - 1) + fib(n - 2)
        let mut main = ClassBuilder::new("Main", Some("java/lang/Object"));
        let fib = main.pool().method_ref("Main", "fib", "(I)I");
        let [a, b] = fib.to_be_bytes();
        // 0: iload_0
        // 1: iconst_2
        // 2: if_icmpge +5 (7)
        // 5: iload_0
        // 6: ireturn
        // 7: iload_0
        // 8: iconst_1
        // 9: isub
        // 10: invokestatic fib
        // 13: iload_0
        // 14: iconst_2
        // 15: isub
        // 16: invokestatic fib
        // 19: iadd
        // 20: ireturn
        let code = vec![
            0x1A, 0x05, 0xA2, 0x00, 0x05, 0x1A, 0xAC, 0x1A, 0x04, 0x64, 0xB8, a, b, 0x1A, 0x05,
            0x64, 0xB8, a, b, 0x60, 0xAC,
        ];
        main.method(public_static(), "fib", "(I)I", Some(CodeBuilder::new(3, 1, code)));

        let mut runtime = Runtime::new(test_config());
        runtime.register(parse(main)).unwrap();
        let res = runtime
            .run_static("Main", "fib", "(I)I", &[RuntimeValue::I32(12)])
            .unwrap();
        assert_eq!(res, Some(RuntimeValue::I32(144)));
    }
}
