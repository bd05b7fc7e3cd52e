use super::*;
use crate::ast::{Constant, Expr};
use std::rc::Rc;

fn as_object(value: Value, line: u32) -> Result<ObjRef, Failure> {
    match value {
        Value::Object(obj) => Ok(obj),
        other => Err(Failure::Type {
            line,
            expected: "an object",
            found: other.to_string(),
        }),
    }
}

impl Interpreter {
    /// Maps one AST node, given an environment, to a completion. The match
    /// is exhaustive over the closed node set; a `Return` completion from
    /// any sub-expression short-circuits the enclosing evaluation.
    pub(crate) fn eval(&mut self, expr: &Expr, env: &ObjRef) -> Result<Completion, Failure> {
        match expr {
            // No block scoping: every instruction runs in the same
            // environment, and the block itself yields undefined.
            Expr::Block { instrs, .. } => {
                for instr in instrs {
                    match self.eval(instr, env)? {
                        Completion::Normal(_) => {}
                        ret => return Ok(ret),
                    }
                }
                Ok(Completion::Normal(Value::Undefined))
            }
            Expr::Literal { value, .. } => Ok(Completion::Normal(match value {
                Constant::Int(n) => Value::Int(*n),
                Constant::Str(s) => Value::Str(Rc::from(s.as_str())),
            })),
            Expr::FunCall { callee, args, line } => {
                let func = match self.eval(callee, env)? {
                    Completion::Normal(v) => v,
                    ret => return Ok(ret),
                };
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    match self.eval(arg, env)? {
                        Completion::Normal(v) => values.push(v),
                        ret => return Ok(ret),
                    }
                }
                self.call_function(&func, &Value::Undefined, &values, *line)
                    .map(Completion::Normal)
            }
            Expr::LocalVarAccess { name, .. } => {
                Ok(Completion::Normal(env.borrow().lookup(name)))
            }
            Expr::LocalVarAssignment {
                name,
                expr,
                declaration,
                line,
            } => {
                let bound = env.borrow().lookup(name);
                if !declaration && bound.is_undefined() {
                    return Err(Failure::UndefinedVariable {
                        line: *line,
                        name: name.clone(),
                    });
                }
                if *declaration && !bound.is_undefined() {
                    return Err(Failure::Redeclaration {
                        line: *line,
                        name: name.clone(),
                    });
                }
                let value = match self.eval(expr, env)? {
                    Completion::Normal(v) => v,
                    ret => return Ok(ret),
                };
                env.borrow_mut().register(name, value);
                Ok(Completion::Normal(Value::Undefined))
            }
            Expr::Fun {
                name,
                params,
                body,
                line,
            } => {
                let func_name = name.clone().unwrap_or_else(|| "lambda".to_string());
                let func = Value::Object(ObjectData::new_function(Function::Closure {
                    name: func_name,
                    params: params.clone(),
                    body: Rc::new((**body).clone()),
                    env: env.clone(),
                    line: *line,
                }));
                if let Some(name) = name {
                    env.borrow_mut().register(name, func.clone());
                }
                Ok(Completion::Normal(func))
            }
            Expr::Return { expr, .. } => {
                let value = match expr {
                    Some(expr) => match self.eval(expr, env)? {
                        Completion::Normal(v) => v,
                        ret => return Ok(ret),
                    },
                    None => Value::Undefined,
                };
                Ok(Completion::Return(value))
            }
            Expr::If {
                condition,
                true_block,
                false_block,
                ..
            } => {
                let cond = match self.eval(condition, env)? {
                    Completion::Normal(v) => v,
                    ret => return Ok(ret),
                };
                // Only the integer 0 selects the false branch.
                if cond == Value::Int(0) {
                    self.eval(false_block, env)
                } else {
                    self.eval(true_block, env)
                }
            }
            Expr::ObjectLiteral { inits, .. } => {
                let object = ObjectData::new_object();
                for (name, init) in inits {
                    let value = match self.eval(init, env)? {
                        Completion::Normal(v) => v,
                        ret => return Ok(ret),
                    };
                    object.borrow_mut().register(name, value);
                }
                Ok(Completion::Normal(Value::Object(object)))
            }
            Expr::FieldAccess {
                receiver,
                name,
                line,
            } => {
                let value = match self.eval(receiver, env)? {
                    Completion::Normal(v) => v,
                    ret => return Ok(ret),
                };
                let object = as_object(value, *line)?;
                let value = object.borrow().lookup(name);
                Ok(Completion::Normal(value))
            }
            Expr::FieldAssignment {
                receiver,
                name,
                expr,
                line,
            } => {
                let value = match self.eval(receiver, env)? {
                    Completion::Normal(v) => v,
                    ret => return Ok(ret),
                };
                let object = as_object(value, *line)?;
                let value = match self.eval(expr, env)? {
                    Completion::Normal(v) => v,
                    ret => return Ok(ret),
                };
                // Writes go directly to the receiver, no parent walk.
                object.borrow_mut().register(name, value);
                Ok(Completion::Normal(Value::Undefined))
            }
            Expr::MethodCall {
                receiver,
                name,
                args,
                line,
            } => {
                let value = match self.eval(receiver, env)? {
                    Completion::Normal(v) => v,
                    ret => return Ok(ret),
                };
                let object = as_object(value, *line)?;
                let method = object.borrow().lookup(name);
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    match self.eval(arg, env)? {
                        Completion::Normal(v) => values.push(v),
                        ret => return Ok(ret),
                    }
                }
                self.call_function(&method, &Value::Object(object), &values, *line)
                    .map(Completion::Normal)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Script;
    use crate::parser::Parser;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    #[derive(Clone, Default)]
    struct SharedBuf(Rc<RefCell<Vec<u8>>>);

    impl std::io::Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.borrow_mut().write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn parse(src: &str) -> Script {
        Parser::new(src).unwrap().parse_script().unwrap()
    }

    /// Runs a script and returns everything `print` wrote.
    fn run(src: &str) -> Result<String, Failure> {
        let buf = SharedBuf::default();
        let mut interp = Interpreter::with_output(Box::new(buf.clone()));
        interp.run(&parse(src))?;
        let out = buf.0.borrow();
        Ok(String::from_utf8(out.clone()).unwrap())
    }

    /// Evaluates a script instruction by instruction and returns the value
    /// of the last one.
    fn eval_last(interp: &mut Interpreter, src: &str) -> Result<Value, Failure> {
        let script = parse(src);
        let Expr::Block { instrs, .. } = &script.body else {
            panic!("script body is not a block");
        };
        let env = interp.global_env.clone();
        let mut last = Value::Undefined;
        for instr in instrs {
            last = match interp.eval(instr, &env)? {
                Completion::Normal(v) => v,
                Completion::Return(_) => panic!("return escaped the top level"),
            };
        }
        Ok(last)
    }

    fn eval_value(src: &str) -> Result<Value, Failure> {
        eval_last(&mut Interpreter::new(), src)
    }

    #[test]
    fn literal_evaluates_to_itself() {
        assert_eq!(eval_value("42;").unwrap(), Value::Int(42));
        assert_eq!(eval_value("'hi';").unwrap(), Value::Str("hi".into()));
        // In a nested environment as well
        assert_eq!(
            eval_value("function f() { return 42; } f();").unwrap(),
            Value::Int(42)
        );
    }

    #[test]
    fn declare_then_read() {
        assert_eq!(eval_value("var x = 3; x;").unwrap(), Value::Int(3));
        assert_eq!(eval_value("var x = 0 - 17; x;").unwrap(), Value::Int(-17));
    }

    #[test]
    fn undeclared_read_is_undefined() {
        assert_eq!(eval_value("nothing;").unwrap(), Value::Undefined);
    }

    #[test]
    fn redeclaration_fails() {
        let err = run("var x = 1; var x = 2;").unwrap_err();
        assert!(matches!(err, Failure::Redeclaration { line: 1, ref name } if name == "x"));
    }

    #[test]
    fn redeclaration_rhs_side_effect_is_not_observed() {
        let buf = SharedBuf::default();
        let mut interp = Interpreter::with_output(Box::new(buf.clone()));
        let err = interp.run(&parse("var x = 1; var x = print(9);")).unwrap_err();
        assert!(matches!(err, Failure::Redeclaration { .. }));
        assert!(buf.0.borrow().is_empty());
    }

    #[test]
    fn assignment_to_undeclared_name_fails() {
        let err = eval_value("y = 1;").unwrap_err();
        assert!(matches!(err, Failure::UndefinedVariable { line: 1, ref name } if name == "y"));
    }

    #[test]
    fn declaration_conflicts_with_outer_binding() {
        // lookup walks the whole chain, so shadowing an outer non-undefined
        // binding is a redeclaration
        let err = eval_value("var x = 1; function f() { var x = 2; } f();").unwrap_err();
        assert!(matches!(err, Failure::Redeclaration { ref name, .. } if name == "x"));
    }

    #[test]
    fn if_zero_takes_false_branch_only() {
        let out = run("if (0) { print('then'); } else { print('else'); }").unwrap();
        assert_eq!(out, "else\n");
        let out = run("if (3) { print('then'); } else { print('else'); }").unwrap();
        assert_eq!(out, "then\n");
        // Non-integer conditions are truthy
        let out = run("if ('0') { print('then'); } else { print('else'); }").unwrap();
        assert_eq!(out, "then\n");
    }

    #[test]
    fn untaken_branch_has_no_side_effect() {
        let value = eval_value(
            "var o = { hit: 0 };\n\
             if (0) { o.hit = 1; } else { }\n\
             o.hit;",
        )
        .unwrap();
        assert_eq!(value, Value::Int(0));
    }

    #[test]
    fn arity_mismatch_never_enters_the_body() {
        let buf = SharedBuf::default();
        let mut interp = Interpreter::with_output(Box::new(buf.clone()));
        let err = interp
            .run(&parse("function f(a) { print('entered'); } f(1, 2);"))
            .unwrap_err();
        assert!(matches!(
            err,
            Failure::ArityMismatch {
                line: 1,
                expected: 1,
                got: 2
            }
        ));
        assert!(buf.0.borrow().is_empty());
    }

    #[test]
    fn function_definition_returns_value_and_registers_name() {
        let mut interp = Interpreter::new();
        let value = eval_last(&mut interp, "function f(a) { return a; }").unwrap();
        assert!(matches!(value, Value::Object(_)));
        assert_eq!(
            eval_last(&mut interp, "f(9);").unwrap(),
            Value::Int(9)
        );
    }

    #[test]
    fn anonymous_function_gets_placeholder_name() {
        let value = eval_value("var f = function(a) { return a; }; f;").unwrap();
        assert_eq!(value.to_string(), "function lambda");
    }

    #[test]
    fn falling_off_the_end_yields_undefined() {
        assert_eq!(
            eval_value("function f() { 1; } f();").unwrap(),
            Value::Undefined
        );
    }

    #[test]
    fn scoping_is_lexical_not_dynamic() {
        // g reads x from its defining scope, not from the caller's frame
        let value = eval_value(
            "var x = 1;\n\
             function g() { return x; }\n\
             function h(x) { return g(); }\n\
             h(99);",
        )
        .unwrap();
        assert_eq!(value, Value::Int(1));
    }

    #[test]
    fn closure_observes_defining_scope_mutation_after_return() {
        let value = eval_value(
            "function make() {\n\
             \tvar count = 0;\n\
             \tfunction get() { return count; }\n\
             \tcount = 7;\n\
             \treturn get;\n\
             }\n\
             var g = make();\n\
             g();",
        )
        .unwrap();
        assert_eq!(value, Value::Int(7));
    }

    #[test]
    fn counter_factories_do_not_interfere() {
        // Captured state lives in an object shared through the captured
        // environment; each factory call gets its own.
        let out = run(
            "function make() {\n\
             \tvar state = { count: 0 };\n\
             \tfunction inc() {\n\
             \t\tstate.count = +(state.count, 1);\n\
             \t\treturn state.count;\n\
             \t}\n\
             \treturn inc;\n\
             }\n\
             var c1 = make();\n\
             var c2 = make();\n\
             print(c1(), c1(), c1(), c2());",
        )
        .unwrap();
        assert_eq!(out, "1 2 3 1\n");
    }

    #[test]
    fn sibling_closures_share_the_captured_environment() {
        let out = run(
            "function make() {\n\
             \tvar box = { n: 0 };\n\
             \tfunction bump() { box.n = +(box.n, 1); return box.n; }\n\
             \tfunction read() { return box.n; }\n\
             \treturn { bump: bump, read: read };\n\
             }\n\
             var pair = make();\n\
             pair.bump();\n\
             pair.bump();\n\
             print(pair.read());",
        )
        .unwrap();
        assert_eq!(out, "2\n");
    }

    #[test]
    fn plain_assignment_writes_the_innermost_frame() {
        // Assignment registers in the current frame even when the binding
        // came from the chain, so the outer variable is left alone.
        let value = eval_value(
            "var x = 1;\n\
             function f() { x = 2; return x; }\n\
             f();\n\
             x;",
        )
        .unwrap();
        assert_eq!(value, Value::Int(1));
    }

    #[test]
    fn global_self_reference_allows_top_scope_writes() {
        let value = eval_value(
            "var x = 1;\n\
             function f() { global.x = 2; }\n\
             f();\n\
             x;",
        )
        .unwrap();
        assert_eq!(value, Value::Int(2));
    }

    #[test]
    fn this_is_undefined_in_plain_calls() {
        assert_eq!(
            eval_value("function f() { return this; } f();").unwrap(),
            Value::Undefined
        );
    }

    #[test]
    fn method_call_binds_this_to_the_receiver() {
        let value = eval_value(
            "var o = { n: 5 };\n\
             function getter() { return this.n; }\n\
             o.get = getter;\n\
             o.get();",
        )
        .unwrap();
        assert_eq!(value, Value::Int(5));
    }

    #[test]
    fn method_found_through_the_parent_chain() {
        let mut interp = Interpreter::new();
        // No surface syntax creates parented objects; build the receiver
        // by hand and bind it in the global environment.
        eval_last(&mut interp, "function m() { return 11; }").unwrap();
        let method = interp.global_env.borrow().lookup("m");
        let proto = ObjectData::new_object();
        proto.borrow_mut().register("m", method);
        let object = ObjectData::new_object();
        object.borrow_mut().parent = Some(proto);
        interp
            .global_env
            .borrow_mut()
            .register("o", Value::Object(object));
        assert_eq!(eval_last(&mut interp, "o.m();").unwrap(), Value::Int(11));
    }

    #[test]
    fn field_read_follows_chain_but_write_stays_local() {
        let mut interp = Interpreter::new();
        let proto = ObjectData::new_object();
        proto.borrow_mut().register("a", Value::Int(1));
        let object = ObjectData::new_object();
        object.borrow_mut().parent = Some(proto.clone());
        interp
            .global_env
            .borrow_mut()
            .register("o", Value::Object(object));
        assert_eq!(eval_last(&mut interp, "o.a;").unwrap(), Value::Int(1));
        eval_last(&mut interp, "o.a = 2;").unwrap();
        assert_eq!(eval_last(&mut interp, "o.a;").unwrap(), Value::Int(2));
        assert_eq!(proto.borrow().lookup("a"), Value::Int(1));
    }

    #[test]
    fn object_literal_fields() {
        let mut interp = Interpreter::new();
        assert_eq!(
            eval_last(&mut interp, "var o = { a: 1 }; o.a;").unwrap(),
            Value::Int(1)
        );
        assert_eq!(eval_last(&mut interp, "o.b;").unwrap(), Value::Undefined);
    }

    #[test]
    fn object_initializers_run_in_order() {
        let out = run("var o = { a: print(1), b: print(2) };").unwrap();
        assert_eq!(out, "1\n2\n");
    }

    #[test]
    fn calling_a_non_function_fails() {
        let err = eval_value("var x = 3; x(1);").unwrap_err();
        assert!(matches!(
            err,
            Failure::Type {
                line: 1,
                expected: "a function",
                ..
            }
        ));
    }

    #[test]
    fn field_access_on_non_object_fails() {
        let err = eval_value("var x = 3; x.a;").unwrap_err();
        assert!(matches!(
            err,
            Failure::Type {
                expected: "an object",
                ..
            }
        ));
    }

    #[test]
    fn method_call_on_missing_method_fails() {
        let err = eval_value("var o = { a: 1 }; o.m();").unwrap_err();
        assert!(matches!(
            err,
            Failure::Type {
                expected: "a function",
                ..
            }
        ));
    }

    #[test]
    fn print_sum_end_to_end() {
        let out = run("var x = 3; var y = 4; print(+(x, y));").unwrap();
        assert_eq!(out, "7\n");
    }

    #[test]
    fn recursive_factorial() {
        let value = eval_value(
            "function f(n) {\n\
             \tif (==(n, 0)) { return 1; }\n\
             \treturn *(n, f(-(n, 1)));\n\
             }\n\
             f(5);",
        )
        .unwrap();
        assert_eq!(value, Value::Int(120));
    }

    #[test]
    fn return_unwinds_nested_blocks_only_to_the_call_boundary() {
        let value = eval_value(
            "function f(n) {\n\
             \tif (n) { if (n) { return 1; } } else { }\n\
             \treturn 2;\n\
             }\n\
             f(1);",
        )
        .unwrap();
        assert_eq!(value, Value::Int(1));
        // The caller sees an ordinary value, not a stray signal.
        let out = run("function f() { return 5; } print(f(), 6);").unwrap();
        assert_eq!(out, "5 6\n");
    }

    #[test]
    fn return_escaping_a_hand_built_script_is_detected() {
        let mut interp = Interpreter::new();
        let script = Script {
            body: Expr::Block {
                instrs: vec![Expr::Return { expr: None, line: 1 }],
                line: 1,
            },
        };
        let err = interp.run(&script).unwrap_err();
        assert!(matches!(err, Failure::Builtin { .. }));
    }

    #[test]
    fn failure_renders_with_line_number() {
        let err = run("var a = 1;\nb = 2;").unwrap_err();
        assert_eq!(err.to_string(), "line 2: no variable b defined");
    }
}
