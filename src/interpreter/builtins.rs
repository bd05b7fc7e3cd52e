use super::*;
use std::cmp::Ordering;
use std::io::Write;
use std::rc::Rc;

impl Interpreter {
    /// Populates the root environment: the `global` self-reference, `print`,
    /// and the arithmetic and comparison operators. Operators are ordinary
    /// bindings, which is why scripts can pass them around like any other
    /// function value.
    pub(crate) fn setup_globals(&mut self) {
        let global = self.global_env.clone();
        global
            .borrow_mut()
            .register("global", Value::Object(global.clone()));

        self.register_native("print", |interp, _receiver, args, line| {
            let text = args
                .iter()
                .map(Value::to_string)
                .collect::<Vec<_>>()
                .join(" ");
            writeln!(interp.out, "{text}").map_err(|e| Failure::Builtin {
                line,
                message: format!("print failed: {e}"),
            })?;
            Ok(Value::Undefined)
        });

        let int_ops: [(&str, fn(i32, i32) -> i32); 3] = [
            ("+", i32::wrapping_add),
            ("-", i32::wrapping_sub),
            ("*", i32::wrapping_mul),
        ];
        for (name, op) in int_ops {
            self.register_native(name, move |_, _, args, line| {
                let (a, b) = int_operands(args, line)?;
                Ok(Value::Int(op(a, b)))
            });
        }
        self.register_native("/", |_, _, args, line| {
            let (a, b) = int_operands(args, line)?;
            if b == 0 {
                return Err(Failure::Builtin {
                    line,
                    message: "division by zero".to_string(),
                });
            }
            Ok(Value::Int(a.wrapping_div(b)))
        });
        self.register_native("%", |_, _, args, line| {
            let (a, b) = int_operands(args, line)?;
            if b == 0 {
                return Err(Failure::Builtin {
                    line,
                    message: "modulo by zero".to_string(),
                });
            }
            Ok(Value::Int(a.wrapping_rem(b)))
        });

        self.register_native("==", |_, _, args, line| {
            let (a, b) = operand_pair(args, line)?;
            Ok(flag(a == b))
        });
        self.register_native("!=", |_, _, args, line| {
            let (a, b) = operand_pair(args, line)?;
            Ok(flag(a != b))
        });

        let ordering_ops: [(&str, fn(Ordering) -> bool); 4] = [
            ("<", Ordering::is_lt),
            ("<=", Ordering::is_le),
            (">", Ordering::is_gt),
            (">=", Ordering::is_ge),
        ];
        for (name, test) in ordering_ops {
            self.register_native(name, move |_, _, args, line| {
                let (a, b) = operand_pair(args, line)?;
                Ok(flag(test(compare(a, b, line)?)))
            });
        }
    }

    fn register_native(
        &mut self,
        name: &str,
        f: impl Fn(&mut Interpreter, &Value, &[Value], u32) -> Result<Value, Failure> + 'static,
    ) {
        let func = ObjectData::new_function(Function::Native(name.to_string(), Rc::new(f)));
        self.global_env
            .borrow_mut()
            .register(name, Value::Object(func));
    }
}

fn flag(b: bool) -> Value {
    Value::Int(if b { 1 } else { 0 })
}

fn operand_pair(args: &[Value], line: u32) -> Result<(&Value, &Value), Failure> {
    match args {
        [a, b] => Ok((a, b)),
        _ => Err(Failure::ArityMismatch {
            line,
            expected: 2,
            got: args.len(),
        }),
    }
}

fn int_operands(args: &[Value], line: u32) -> Result<(i32, i32), Failure> {
    match operand_pair(args, line)? {
        (Value::Int(a), Value::Int(b)) => Ok((*a, *b)),
        (Value::Int(_), other) | (other, _) => Err(Failure::Type {
            line,
            expected: "an integer",
            found: other.to_string(),
        }),
    }
}

/// Ordering is defined within integers and within strings; any other
/// combination fails.
fn compare(a: &Value, b: &Value, line: u32) -> Result<Ordering, Failure> {
    match (a, b) {
        (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
        (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
        _ => Err(Failure::Type {
            line,
            expected: "an orderable pair",
            found: format!("{a} and {b}"),
        }),
    }
}
