use crate::ast::Script;
use std::io::{self, Write};

mod builtins;
mod eval;
mod types;
pub use types::*;

/// Tree-walking interpreter. Owns the root environment and the sink the
/// `print` builtin writes to.
pub struct Interpreter {
    global_env: ObjRef,
    out: Box<dyn Write>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    pub fn with_output(out: Box<dyn Write>) -> Self {
        let global_env = ObjectData::new_env(None);
        let mut interp = Self { global_env, out };
        interp.setup_globals();
        interp
    }

    /// Evaluates the script's top-level block in the global environment.
    pub fn run(&mut self, script: &Script) -> Result<(), Failure> {
        match self.eval(&script.body, &self.global_env.clone())? {
            Completion::Normal(_) => Ok(()),
            // The parser rejects top-level returns, so a Return completion
            // can only come from a hand-built script.
            Completion::Return(_) => Err(Failure::Builtin {
                line: script.body.line(),
                message: "return escaped the top-level block".to_string(),
            }),
        }
    }

    /// The one place the non-local return signal is consumed. A `Normal`
    /// completion of the body means the function fell off the end, which
    /// yields `Undefined`.
    pub(crate) fn call_function(
        &mut self,
        func_val: &Value,
        receiver: &Value,
        args: &[Value],
        call_line: u32,
    ) -> Result<Value, Failure> {
        let function = match func_val {
            Value::Object(obj) => obj.borrow().function.clone(),
            _ => None,
        };
        let Some(function) = function else {
            return Err(Failure::Type {
                line: call_line,
                expected: "a function",
                found: func_val.to_string(),
            });
        };
        match function {
            Function::Native(_, f) => f(self, receiver, args, call_line),
            Function::Closure {
                params,
                body,
                env,
                line,
                ..
            } => {
                if args.len() != params.len() {
                    return Err(Failure::ArityMismatch {
                        line,
                        expected: params.len(),
                        got: args.len(),
                    });
                }
                // Parent is the captured defining environment, never the
                // caller's frame.
                let frame = ObjectData::new_env(Some(env));
                {
                    let mut frame = frame.borrow_mut();
                    frame.register("this", receiver.clone());
                    for (param, arg) in params.iter().zip(args) {
                        frame.register(param, arg.clone());
                    }
                }
                match self.eval(&body, &frame)? {
                    Completion::Normal(_) => Ok(Value::Undefined),
                    Completion::Return(value) => Ok(value),
                }
            }
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}
