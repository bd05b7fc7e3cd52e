use crate::ast::Expr;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

/// Runtime failure. Every failure aborts the running script and unwinds to
/// the interpreter's caller; the language has no catch construct.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Failure {
    #[error("line {line}: type error: {found} is not {expected}")]
    Type {
        line: u32,
        expected: &'static str,
        found: String,
    },
    #[error("line {line}: no variable {name} defined")]
    UndefinedVariable { line: u32, name: String },
    #[error("line {line}: variable {name} already defined")]
    Redeclaration { line: u32, name: String },
    #[error("line {line}: wrong number of arguments: expected {expected}, got {got}")]
    ArityMismatch {
        line: u32,
        expected: usize,
        got: usize,
    },
    #[error("line {line}: {message}")]
    Builtin { line: u32, message: String },
}

/// Outcome of evaluating one expression. `Return` is the non-local return
/// signal: it rides the success channel of `Result<Completion, Failure>` so
/// it can never be mistaken for a failure, and it is consumed at exactly one
/// place, the function invocation boundary.
#[derive(Debug)]
pub enum Completion {
    Normal(Value),
    Return(Value),
}

pub type ObjRef = Rc<RefCell<ObjectData>>;

#[derive(Clone, Debug)]
pub enum Value {
    Undefined,
    Int(i32),
    Str(Rc<str>),
    Object(ObjRef),
}

impl Value {
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }
}

// Objects compare by identity, everything else by value. `Undefined` equals
// only itself.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Object(obj) => match &obj.borrow().function {
                Some(func) => write!(f, "function {}", func.name()),
                None => write!(f, "[object Object]"),
            },
        }
    }
}

pub type NativeFn =
    Rc<dyn Fn(&mut super::Interpreter, &Value, &[Value], u32) -> Result<Value, Failure>>;

/// Invocation capability of a dynamic object: either host behavior or an
/// interpreted closure over its defining environment.
#[derive(Clone)]
pub enum Function {
    Native(String, NativeFn),
    Closure {
        name: String,
        params: Vec<String>,
        body: Rc<Expr>,
        /// Shared with the frame that created it and with every other
        /// closure capturing it.
        env: ObjRef,
        /// Line of the definition, cited by arity failures.
        line: u32,
    },
}

impl Function {
    pub fn name(&self) -> &str {
        match self {
            Function::Native(name, _) => name,
            Function::Closure { name, .. } => name,
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Function::Native(name, _) => write!(f, "Function::Native({name:?})"),
            Function::Closure { name, params, .. } => {
                write!(f, "Function::Closure({name:?}, {params:?})")
            }
        }
    }
}

/// The single runtime representation behind plain objects, environments and
/// functions: a property store with an optional parent used as read
/// fallback, plus an optional invocation capability.
#[derive(Debug, Default)]
pub struct ObjectData {
    properties: FxHashMap<String, Value>,
    pub parent: Option<ObjRef>,
    pub function: Option<Function>,
}

impl ObjectData {
    pub fn new_env(parent: Option<ObjRef>) -> ObjRef {
        Rc::new(RefCell::new(ObjectData {
            parent,
            ..ObjectData::default()
        }))
    }

    pub fn new_object() -> ObjRef {
        Rc::new(RefCell::new(ObjectData::default()))
    }

    pub fn new_function(function: Function) -> ObjRef {
        Rc::new(RefCell::new(ObjectData {
            function: Some(function),
            ..ObjectData::default()
        }))
    }

    /// Defines or overwrites a property on this object. Never touches the
    /// parent, so a plain assignment always lands in the innermost frame.
    pub fn register(&mut self, name: &str, value: Value) {
        self.properties.insert(name.to_string(), value);
    }

    /// Reads a property, falling back to the parent chain. A total miss
    /// yields `Undefined`, never an error.
    pub fn lookup(&self, name: &str) -> Value {
        if let Some(value) = self.properties.get(name) {
            return value.clone();
        }
        match &self.parent {
            Some(parent) => parent.borrow().lookup(name),
            None => Value::Undefined,
        }
    }
}
