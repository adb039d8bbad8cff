//! Tree-walking evaluator

use std::collections::BTreeMap;

use serde::Serialize;

use super::error::Trap;
use super::value::Value;
use crate::ir::{
    AtomicRmwOp, BinaryKind, BinaryOp, ExprId, ExprKind, Function, Label, Module, Type, UnaryKind, UnaryOp,
};

const STACK_RED_ZONE: usize = 128 * 1024; // 128KB remaining triggers growth
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024; // Grow by 4MB each time

/// Size of linear memory in bytes
pub const MEMORY_SIZE: usize = 64 * 1024;

const DEFAULT_FUEL: u64 = 1_000_000;
const MAX_CALL_DEPTH: usize = 1_000;

/// One call to an imported function
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallRecord {
    pub name: String,
    pub args: Vec<Value>,
}

/// Everything observable about one run, for comparing two versions of a
/// module
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    pub result: Result<Option<Value>, Trap>,
    pub trace: Vec<CallRecord>,
    pub globals: BTreeMap<String, Value>,
    pub memory: Vec<u8>,
}

/// Non-local exits, threaded through `Err` like the traps they sit beside
enum Flow {
    Break(Label, Option<Value>),
    Return(Option<Value>),
    Trap(Trap),
}

impl From<Trap> for Flow {
    fn from(trap: Trap) -> Self {
        Flow::Trap(trap)
    }
}

type EvalResult = Result<Option<Value>, Flow>;

/// Interpreter over a module
pub struct Interpreter<'m> {
    module: &'m Module,
    memory: Vec<u8>,
    globals: BTreeMap<String, Value>,
    trace: Vec<CallRecord>,
    /// Loop iterations and calls left before giving up
    fuel: u64,
    depth: usize,
}

impl<'m> Interpreter<'m> {
    /// Create an interpreter with zeroed memory and globals
    pub fn new(module: &'m Module) -> Self {
        let globals = module
            .globals
            .iter()
            .filter_map(|g| Value::zero(g.ty).map(|zero| (g.name.clone(), zero)))
            .collect();
        Self {
            module,
            memory: vec![0; MEMORY_SIZE],
            globals,
            trace: Vec::new(),
            fuel: DEFAULT_FUEL,
            depth: 0,
        }
    }

    pub fn with_fuel(mut self, fuel: u64) -> Self {
        self.fuel = fuel;
        self
    }

    pub fn trace(&self) -> &[CallRecord] {
        &self.trace
    }

    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    pub fn global(&self, name: &str) -> Option<Value> {
        self.globals.get(name).copied()
    }

    /// Call a function by name
    pub fn call(&mut self, name: &str, args: &[Value]) -> Result<Option<Value>, Trap> {
        let module = self.module;
        match module.function(name) {
            Some(func) => self.call_function(func, args.to_vec()),
            None => self.call_import(name, args.to_vec()),
        }
    }

    /// Run `name` to completion and capture the observable state
    pub fn execute(module: &Module, name: &str, args: &[Value]) -> Execution {
        let mut interp = Interpreter::new(module);
        let result = interp.call(name, args);
        Execution {
            result,
            trace: interp.trace,
            globals: interp.globals,
            memory: interp.memory,
        }
    }

    fn consume_fuel(&mut self) -> Result<(), Trap> {
        if self.fuel == 0 {
            return Err(Trap::OutOfFuel);
        }
        self.fuel -= 1;
        Ok(())
    }

    fn call_function(&mut self, func: &Function, args: Vec<Value>) -> Result<Option<Value>, Trap> {
        if args.len() != func.params.len() {
            return Err(Trap::ArgumentMismatch {
                name: func.name.clone(),
                expected: func.params.len(),
                got: args.len(),
            });
        }
        for (arg, ty) in args.iter().zip(&func.params) {
            if arg.ty() != *ty {
                return Err(Trap::TypeMismatch(format!("argument {arg} to `{}` should be {ty}", func.name)));
            }
        }
        if self.depth >= MAX_CALL_DEPTH {
            return Err(Trap::CallStackExhausted);
        }
        self.consume_fuel()?;

        let mut locals = args;
        locals.extend(func.locals.iter().filter_map(|ty| Value::zero(*ty)));

        self.depth += 1;
        let outcome = self.eval(func, &mut locals, func.body);
        self.depth -= 1;

        match outcome {
            Ok(value) | Err(Flow::Return(value)) => Ok(value),
            Err(Flow::Trap(trap)) => Err(trap),
            Err(Flow::Break(label, _)) => Err(Trap::TypeMismatch(format!("jump to {label} escaped the function"))),
        }
    }

    /// Imports are recorded and answer with the trace length so far
    fn call_import(&mut self, name: &str, args: Vec<Value>) -> Result<Option<Value>, Trap> {
        let Some(import) = self.module.import(name) else {
            return Err(Trap::UnknownFunction { name: name.to_string() });
        };
        if args.len() != import.params.len() {
            return Err(Trap::ArgumentMismatch {
                name: name.to_string(),
                expected: import.params.len(),
                got: args.len(),
            });
        }
        self.consume_fuel()?;
        self.trace.push(CallRecord {
            name: name.to_string(),
            args,
        });
        Ok(Value::from_count(self.trace.len(), import.result))
    }

    fn eval(&mut self, func: &Function, locals: &mut Vec<Value>, id: ExprId) -> EvalResult {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.eval_inner(func, locals, id))
    }

    /// Evaluate an operand that must produce a value
    fn eval_value(&mut self, func: &Function, locals: &mut Vec<Value>, id: ExprId) -> Result<Value, Flow> {
        match self.eval(func, locals, id)? {
            Some(value) => Ok(value),
            None => Err(Trap::TypeMismatch("operand produced no value".to_string()).into()),
        }
    }

    fn eval_i32(&mut self, func: &Function, locals: &mut Vec<Value>, id: ExprId) -> Result<i32, Flow> {
        let value = self.eval_value(func, locals, id)?;
        value
            .as_i32()
            .ok_or_else(|| Trap::TypeMismatch(format!("expected i32, found {value}")).into())
    }

    fn eval_inner(&mut self, func: &Function, locals: &mut Vec<Value>, id: ExprId) -> EvalResult {
        match &func[id].kind {
            ExprKind::Nop => Ok(None),
            ExprKind::Unreachable => Err(Trap::Unreachable.into()),
            ExprKind::Const(literal) => Ok(Some(Value::from(*literal))),

            ExprKind::LocalGet { index } => match locals.get(*index as usize) {
                Some(value) => Ok(Some(*value)),
                None => Err(Trap::TypeMismatch(format!("no local {index}")).into()),
            },
            ExprKind::LocalSet { index, value } => {
                let value = self.eval_value(func, locals, *value)?;
                match locals.get_mut(*index as usize) {
                    Some(slot) => *slot = value,
                    None => return Err(Trap::TypeMismatch(format!("no local {index}")).into()),
                }
                Ok(None)
            }
            ExprKind::GlobalGet { name } => match self.globals.get(name) {
                Some(value) => Ok(Some(*value)),
                None => Err(Trap::TypeMismatch(format!("no global ${name}")).into()),
            },
            ExprKind::GlobalSet { name, value } => {
                let value = self.eval_value(func, locals, *value)?;
                self.globals.insert(name.clone(), value);
                Ok(None)
            }

            ExprKind::Block { name, list } => {
                let mut result = None;
                for &item in list {
                    match self.eval(func, locals, item) {
                        Ok(value) => result = value,
                        Err(Flow::Break(label, value)) if Some(&label) == name.as_ref() => return Ok(value),
                        Err(flow) => return Err(flow),
                    }
                }
                Ok(result)
            }
            ExprKind::Loop { name, body } => loop {
                match self.eval(func, locals, *body) {
                    Err(Flow::Break(label, _)) if Some(&label) == name.as_ref() => self.consume_fuel()?,
                    other => return other,
                }
            },
            ExprKind::If { condition, if_true, if_false } => {
                if self.eval_i32(func, locals, *condition)? != 0 {
                    self.eval(func, locals, *if_true)
                } else if let Some(if_false) = if_false {
                    self.eval(func, locals, *if_false)
                } else {
                    Ok(None)
                }
            }
            ExprKind::Break { name, value, condition } => {
                let value = match value {
                    Some(value) => Some(self.eval_value(func, locals, *value)?),
                    None => None,
                };
                if let Some(condition) = condition {
                    if self.eval_i32(func, locals, *condition)? == 0 {
                        return Ok(value);
                    }
                }
                Err(Flow::Break(name.clone(), value))
            }
            ExprKind::Switch { targets, default, value, condition } => {
                let value = match value {
                    Some(value) => Some(self.eval_value(func, locals, *value)?),
                    None => None,
                };
                let index = self.eval_i32(func, locals, *condition)? as u32 as usize;
                let target = targets.get(index).unwrap_or(default);
                Err(Flow::Break(target.clone(), value))
            }

            ExprKind::Call { target, operands, .. } => {
                let args = self.eval_operands(func, locals, operands)?;
                let module = self.module;
                let result = match module.function(target) {
                    Some(callee) => self.call_function(callee, args),
                    None => self.call_import(target, args),
                };
                Ok(result?)
            }
            ExprKind::CallIndirect { operands, target, .. } => {
                let args = self.eval_operands(func, locals, operands)?;
                let index = self.eval_i32(func, locals, *target)? as u32;
                let module = self.module;
                let Some(callee) = module.functions.get(index as usize) else {
                    return Err(Trap::UndefinedElement { index }.into());
                };
                Ok(self.call_function(callee, args)?)
            }

            ExprKind::Unary { op, value } => {
                let value = self.eval_value(func, locals, *value)?;
                Ok(Some(unary(*op, value)?))
            }
            ExprKind::Binary { op, left, right } => {
                let left = self.eval_value(func, locals, *left)?;
                let right = self.eval_value(func, locals, *right)?;
                Ok(Some(binary(*op, left, right)?))
            }
            ExprKind::Select { if_true, if_false, condition } => {
                let if_true = self.eval_value(func, locals, *if_true)?;
                let if_false = self.eval_value(func, locals, *if_false)?;
                let condition = self.eval_i32(func, locals, *condition)?;
                Ok(Some(if condition != 0 { if_true } else { if_false }))
            }
            ExprKind::Drop { value } => {
                self.eval(func, locals, *value)?;
                Ok(None)
            }
            ExprKind::Return { value } => {
                let value = match value {
                    Some(value) => Some(self.eval_value(func, locals, *value)?),
                    None => None,
                };
                Err(Flow::Return(value))
            }

            ExprKind::Load { ty, ptr, .. } => {
                let address = self.eval_i32(func, locals, *ptr)? as u32;
                Ok(Some(self.load(*ty, address)?))
            }
            ExprKind::Store { ptr, value, .. } => {
                let address = self.eval_i32(func, locals, *ptr)? as u32;
                let value = self.eval_value(func, locals, *value)?;
                self.store(address, value)?;
                Ok(None)
            }
            ExprKind::AtomicRmw { op, ty, ptr, value } => {
                let address = self.eval_i32(func, locals, *ptr)? as u32;
                let operand = self.eval_value(func, locals, *value)?;
                let old = self.load(*ty, address)?;
                self.store(address, atomic_rmw(*op, old, operand)?)?;
                Ok(Some(old))
            }
            ExprKind::AtomicCmpxchg { ty, ptr, expected, replacement } => {
                let address = self.eval_i32(func, locals, *ptr)? as u32;
                let expected = self.eval_value(func, locals, *expected)?;
                let replacement = self.eval_value(func, locals, *replacement)?;
                let old = self.load(*ty, address)?;
                if old == expected {
                    self.store(address, replacement)?;
                }
                Ok(Some(old))
            }
        }
    }

    fn eval_operands(&mut self, func: &Function, locals: &mut Vec<Value>, operands: &[ExprId]) -> Result<Vec<Value>, Flow> {
        operands.iter().map(|&operand| self.eval_value(func, locals, operand)).collect()
    }

    fn bounds(&self, address: u32, size: usize) -> Result<std::ops::Range<usize>, Trap> {
        let start = address as usize;
        match start.checked_add(size) {
            Some(end) if end <= self.memory.len() => Ok(start..end),
            _ => Err(Trap::OutOfBounds { address, size }),
        }
    }

    fn load(&self, ty: Type, address: u32) -> Result<Value, Trap> {
        let size = ty.byte_size().ok_or_else(|| Trap::TypeMismatch(format!("cannot load {ty}")))?;
        let range = self.bounds(address, size)?;
        Value::from_le_bytes(ty, &self.memory[range]).ok_or_else(|| Trap::TypeMismatch(format!("cannot load {ty}")))
    }

    fn store(&mut self, address: u32, value: Value) -> Result<(), Trap> {
        let bytes = value.to_le_bytes();
        let range = self.bounds(address, bytes.len())?;
        self.memory[range].copy_from_slice(&bytes);
        Ok(())
    }
}

// ============================================================================
// Operators
// ============================================================================

fn mismatch(op: &str, value: Value) -> Trap {
    Trap::TypeMismatch(format!("`{op}` applied to {value}"))
}

/// Truncate toward zero, trapping on NaN and on results outside `min..max`
fn truncate(x: f64, min: f64, max: f64) -> Result<f64, Trap> {
    if x.is_nan() {
        return Err(Trap::InvalidConversion);
    }
    let t = x.trunc();
    if t < min || t >= max {
        return Err(Trap::IntegerOverflow);
    }
    Ok(t)
}

fn unary(op: UnaryOp, value: Value) -> Result<Value, Trap> {
    use UnaryKind::*;
    let bad = || mismatch(&op.name(), value);
    Ok(match (op.kind, value) {
        (Eqz, Value::I32(n)) => Value::I32((n == 0) as i32),
        (Eqz, Value::I64(n)) => Value::I32((n == 0) as i32),
        (Clz, Value::I32(n)) => Value::I32(n.leading_zeros() as i32),
        (Clz, Value::I64(n)) => Value::I64(n.leading_zeros() as i64),
        (Ctz, Value::I32(n)) => Value::I32(n.trailing_zeros() as i32),
        (Ctz, Value::I64(n)) => Value::I64(n.trailing_zeros() as i64),
        (Popcnt, Value::I32(n)) => Value::I32(n.count_ones() as i32),
        (Popcnt, Value::I64(n)) => Value::I64(n.count_ones() as i64),
        (Neg, Value::F32(x)) => Value::F32(-x),
        (Neg, Value::F64(x)) => Value::F64(-x),
        (Abs, Value::F32(x)) => Value::F32(x.abs()),
        (Abs, Value::F64(x)) => Value::F64(x.abs()),
        (Sqrt, Value::F32(x)) => Value::F32(x.sqrt()),
        (Sqrt, Value::F64(x)) => Value::F64(x.sqrt()),
        (Wrap, Value::I64(n)) => Value::I32(n as i32),
        (ExtendS, Value::I32(n)) => Value::I64(n as i64),
        (ExtendU, Value::I32(n)) => Value::I64(n as u32 as i64),
        (TruncS | TruncU, Value::F32(x)) => truncate_to(op, x as f64)?,
        (TruncS | TruncU, Value::F64(x)) => truncate_to(op, x)?,
        (ConvertS, Value::I32(n)) => convert(op.result, n as f64, n as f32),
        (ConvertS, Value::I64(n)) => convert(op.result, n as f64, n as f32),
        (ConvertU, Value::I32(n)) => convert(op.result, n as u32 as f64, n as u32 as f32),
        (ConvertU, Value::I64(n)) => convert(op.result, n as u64 as f64, n as u64 as f32),
        _ => return Err(bad()),
    })
}

fn truncate_to(op: UnaryOp, x: f64) -> Result<Value, Trap> {
    let signed = op.kind == UnaryKind::TruncS;
    Ok(match (op.result, signed) {
        (Type::I32, true) => Value::I32(truncate(x, -2147483648.0, 2147483648.0)? as i32),
        (Type::I32, false) => Value::I32(truncate(x, 0.0, 4294967296.0)? as u32 as i32),
        (Type::I64, true) => Value::I64(truncate(x, -9223372036854775808.0, 9223372036854775808.0)? as i64),
        (Type::I64, false) => Value::I64(truncate(x, 0.0, 18446744073709551616.0)? as u64 as i64),
        _ => return Err(Trap::TypeMismatch(format!("`{}` has no integer result", op.name()))),
    })
}

fn convert(result: Type, wide: f64, narrow: f32) -> Value {
    if result == Type::F32 { Value::F32(narrow) } else { Value::F64(wide) }
}

fn binary(op: BinaryOp, left: Value, right: Value) -> Result<Value, Trap> {
    match (left, right) {
        (Value::I32(a), Value::I32(b)) => binary_i32(op.kind, a, b),
        (Value::I64(a), Value::I64(b)) => binary_i64(op.kind, a, b),
        (Value::F32(a), Value::F32(b)) => binary_float(op.kind, a as f64, b as f64)
            .map(|v| match v {
                Value::F64(x) => Value::F32(x as f32),
                other => other,
            })
            .ok_or_else(|| mismatch(&op.name(), left)),
        (Value::F64(a), Value::F64(b)) => binary_float(op.kind, a, b).ok_or_else(|| mismatch(&op.name(), left)),
        _ => Err(mismatch(&op.name(), right)),
    }
}

fn binary_i32(kind: BinaryKind, a: i32, b: i32) -> Result<Value, Trap> {
    use BinaryKind::*;
    let (ua, ub) = (a as u32, b as u32);
    let flag = |c: bool| Value::I32(c as i32);
    Ok(match kind {
        Add => Value::I32(a.wrapping_add(b)),
        Sub => Value::I32(a.wrapping_sub(b)),
        Mul => Value::I32(a.wrapping_mul(b)),
        DivS => Value::I32(match (a, b) {
            (_, 0) => return Err(Trap::DivideByZero),
            (i32::MIN, -1) => return Err(Trap::IntegerOverflow),
            _ => a / b,
        }),
        DivU => Value::I32(ua.checked_div(ub).ok_or(Trap::DivideByZero)? as i32),
        RemS => Value::I32(if b == 0 { return Err(Trap::DivideByZero) } else { a.wrapping_rem(b) }),
        RemU => Value::I32(ua.checked_rem(ub).ok_or(Trap::DivideByZero)? as i32),
        And => Value::I32(a & b),
        Or => Value::I32(a | b),
        Xor => Value::I32(a ^ b),
        Shl => Value::I32(a.wrapping_shl(ub)),
        ShrS => Value::I32(a.wrapping_shr(ub)),
        ShrU => Value::I32(ua.wrapping_shr(ub) as i32),
        Eq => flag(a == b),
        Ne => flag(a != b),
        LtS => flag(a < b),
        LtU => flag(ua < ub),
        GtS => flag(a > b),
        GtU => flag(ua > ub),
        LeS => flag(a <= b),
        LeU => flag(ua <= ub),
        GeS => flag(a >= b),
        GeU => flag(ua >= ub),
        Div | Lt | Gt | Le | Ge | Min | Max => {
            return Err(Trap::TypeMismatch(format!("float operator applied to i32 {a}")));
        }
    })
}

fn binary_i64(kind: BinaryKind, a: i64, b: i64) -> Result<Value, Trap> {
    use BinaryKind::*;
    let (ua, ub) = (a as u64, b as u64);
    let flag = |c: bool| Value::I32(c as i32);
    Ok(match kind {
        Add => Value::I64(a.wrapping_add(b)),
        Sub => Value::I64(a.wrapping_sub(b)),
        Mul => Value::I64(a.wrapping_mul(b)),
        DivS => Value::I64(match (a, b) {
            (_, 0) => return Err(Trap::DivideByZero),
            (i64::MIN, -1) => return Err(Trap::IntegerOverflow),
            _ => a / b,
        }),
        DivU => Value::I64(ua.checked_div(ub).ok_or(Trap::DivideByZero)? as i64),
        RemS => Value::I64(if b == 0 { return Err(Trap::DivideByZero) } else { a.wrapping_rem(b) }),
        RemU => Value::I64(ua.checked_rem(ub).ok_or(Trap::DivideByZero)? as i64),
        And => Value::I64(a & b),
        Or => Value::I64(a | b),
        Xor => Value::I64(a ^ b),
        Shl => Value::I64(a.wrapping_shl(ub as u32)),
        ShrS => Value::I64(a.wrapping_shr(ub as u32)),
        ShrU => Value::I64(ua.wrapping_shr(ub as u32) as i64),
        Eq => flag(a == b),
        Ne => flag(a != b),
        LtS => flag(a < b),
        LtU => flag(ua < ub),
        GtS => flag(a > b),
        GtU => flag(ua > ub),
        LeS => flag(a <= b),
        LeU => flag(ua <= ub),
        GeS => flag(a >= b),
        GeU => flag(ua >= ub),
        Div | Lt | Gt | Le | Ge | Min | Max => {
            return Err(Trap::TypeMismatch(format!("float operator applied to i64 {a}")));
        }
    })
}

/// Float arithmetic in f64; comparisons produce i32
fn binary_float(kind: BinaryKind, a: f64, b: f64) -> Option<Value> {
    use BinaryKind::*;
    let flag = |c: bool| Value::I32(c as i32);
    Some(match kind {
        Add => Value::F64(a + b),
        Sub => Value::F64(a - b),
        Mul => Value::F64(a * b),
        Div => Value::F64(a / b),
        Min => Value::F64(if a.is_nan() || b.is_nan() { f64::NAN } else { a.min(b) }),
        Max => Value::F64(if a.is_nan() || b.is_nan() { f64::NAN } else { a.max(b) }),
        Eq => flag(a == b),
        Ne => flag(a != b),
        Lt => flag(a < b),
        Gt => flag(a > b),
        Le => flag(a <= b),
        Ge => flag(a >= b),
        _ => return None,
    })
}

fn atomic_rmw(op: AtomicRmwOp, old: Value, operand: Value) -> Result<Value, Trap> {
    let combine_i64 = |a: i64, b: i64| match op {
        AtomicRmwOp::Add => a.wrapping_add(b),
        AtomicRmwOp::Sub => a.wrapping_sub(b),
        AtomicRmwOp::And => a & b,
        AtomicRmwOp::Or => a | b,
        AtomicRmwOp::Xor => a ^ b,
        AtomicRmwOp::Xchg => b,
    };
    match (old, operand) {
        (Value::I32(a), Value::I32(b)) => Ok(Value::I32(combine_i64(a as i64, b as i64) as i32)),
        (Value::I64(a), Value::I64(b)) => Ok(Value::I64(combine_i64(a, b))),
        _ => Err(mismatch(op.as_str(), operand)),
    }
}
