//! Reading the text format into IR
//!
//! The parser hands back bare S-expressions; this module resolves names,
//! checks arities and operand types, and builds finalized nodes bottom-up.
//! Module-level names (imports, globals, functions) are collected before
//! any body is read, so calls may refer forward.

use std::collections::{HashMap, HashSet};

use super::builder::Builder;
use super::{
    AtomicRmwOp, BinaryOp, ExprId, Function, Global, Import, Label, Literal, Module, Type, UnaryOp,
};
use crate::ast::{SExpr, Span, Spanned};
use crate::error::{ArborError, Result};
use crate::parser::parse_source;

/// Read a module from source text.
///
/// Accepts either a single `(module ...)` form or its fields at top level.
pub fn read_module(source: &str) -> Result<Module> {
    let document = parse_source(source)?;
    read_document(&document)
}

/// Read a module and return its first function
pub fn read_function(source: &str) -> Result<Function> {
    read_module(source)?
        .functions
        .into_iter()
        .next()
        .ok_or_else(|| ArborError::read("no function defined", Span::new(0, source.len())))
}

pub fn read_document(document: &[Spanned<SExpr>]) -> Result<Module> {
    let fields = match document {
        [single] if single.node.head() == Some("module") => &list_of(single)?[1..],
        _ => document,
    };

    let mut signatures = Signatures::default();
    let mut module = Module::default();
    for field in fields {
        let items = list_of(field)?;
        match field.node.head() {
            Some("import") => {
                let name = label_at(items, 1, field.span)?;
                let (params, result, _) = read_signature(&items[2..])?;
                signatures.declare(&name, params.len(), result, field.span)?;
                module.imports.push(Import { name, params, result });
            }
            Some("global") => {
                let name = label_at(items, 1, field.span)?;
                let ty = value_type_at(items, 2, field.span)?;
                if module.global(&name).is_some() {
                    return Err(ArborError::read(format!("duplicate global `${name}`"), field.span));
                }
                module.globals.push(Global { name, ty });
            }
            Some("func") => {
                let name = label_at(items, 1, field.span)?;
                let (params, result, _) = read_signature(&items[2..])?;
                signatures.declare(&name, params.len(), result, field.span)?;
            }
            _ => {
                return Err(ArborError::read(
                    format!("expected `import`, `global` or `func`, found {}", field.node.describe()),
                    field.span,
                ));
            }
        }
    }

    for field in fields.iter().filter(|f| f.node.head() == Some("func")) {
        let function = FunctionReader::read(&module, &signatures, field)?;
        module.functions.push(function);
    }
    Ok(module)
}

/// Arity and result type of every callable name
#[derive(Default)]
struct Signatures {
    callables: HashMap<String, (usize, Type)>,
}

impl Signatures {
    fn declare(&mut self, name: &str, arity: usize, result: Type, span: Span) -> Result<()> {
        if self.callables.insert(name.to_string(), (arity, result)).is_some() {
            return Err(ArborError::read(format!("duplicate function `${name}`"), span));
        }
        Ok(())
    }
}

// ============================================================================
// Small accessors over S-expression lists
// ============================================================================

fn list_of(node: &Spanned<SExpr>) -> Result<&[Spanned<SExpr>]> {
    node.node
        .as_list()
        .ok_or_else(|| ArborError::read(format!("expected a list, found {}", node.node.describe()), node.span))
}

fn label_at(items: &[Spanned<SExpr>], index: usize, span: Span) -> Result<String> {
    match items.get(index) {
        Some(item) => item.node.as_label().map(str::to_string).ok_or_else(|| {
            ArborError::read(format!("expected a `$name`, found {}", item.node.describe()), item.span)
        }),
        None => Err(ArborError::read("missing `$name`", span)),
    }
}

fn value_type_at(items: &[Spanned<SExpr>], index: usize, span: Span) -> Result<Type> {
    match items.get(index) {
        Some(item) => value_type(item),
        None => Err(ArborError::read("missing type", span)),
    }
}

fn value_type(item: &Spanned<SExpr>) -> Result<Type> {
    item.node
        .as_atom()
        .and_then(Type::from_name)
        .ok_or_else(|| ArborError::read(format!("expected a value type, found {}", item.node.describe()), item.span))
}

/// `(T*)` tail of a `(param ...)`, `(result ...)` or `(local ...)` clause
fn clause<'a>(item: &'a Spanned<SExpr>, keyword: &str) -> Option<&'a [Spanned<SExpr>]> {
    (item.node.head() == Some(keyword)).then(|| item.node.as_list().map(|l| &l[1..]).unwrap_or(&[]))
}

/// Optional `(result T)` clause at the front of `items`
fn result_clause(items: &[Spanned<SExpr>]) -> Result<(Option<Type>, &[Spanned<SExpr>])> {
    match items.first().and_then(|first| clause(first, "result").map(|tys| (first, tys))) {
        Some((_, [ty])) => Ok((Some(value_type(ty)?), &items[1..])),
        Some((first, _)) => Err(ArborError::read("`result` takes exactly one type", first.span)),
        None => Ok((None, items)),
    }
}

/// Read `(param T*)* (result T)? (local T*)*`, returning the rest
fn read_signature(items: &[Spanned<SExpr>]) -> Result<(Vec<Type>, Type, &[Spanned<SExpr>])> {
    let mut rest = items;
    let mut params = Vec::new();
    while let Some(tys) = rest.first().and_then(|first| clause(first, "param")) {
        params.extend(tys.iter().map(value_type).collect::<Result<Vec<_>>>()?);
        rest = &rest[1..];
    }
    let (result, rest) = result_clause(rest)?;
    Ok((params, result.unwrap_or(Type::None), rest))
}

// ============================================================================
// Function bodies
// ============================================================================

struct FunctionReader<'m> {
    module: &'m Module,
    signatures: &'m Signatures,
    func: Function,
    /// Labels in scope, innermost last; the flag marks loops
    scope: Vec<(Label, bool)>,
    defined: HashSet<Label>,
}

impl<'m> FunctionReader<'m> {
    fn read(module: &'m Module, signatures: &'m Signatures, field: &Spanned<SExpr>) -> Result<Function> {
        let items = list_of(field)?;
        let name = label_at(items, 1, field.span)?;
        let (params, result, mut rest) = read_signature(&items[2..])?;
        let mut locals = Vec::new();
        while let Some(tys) = rest.first().and_then(|first| clause(first, "local")) {
            locals.extend(tys.iter().map(value_type).collect::<Result<Vec<_>>>()?);
            rest = &rest[1..];
        }

        let mut reader = FunctionReader {
            module,
            signatures,
            func: Function::new(name, params, locals, result),
            scope: Vec::new(),
            defined: HashSet::new(),
        };
        let body = match rest {
            [] => reader.builder().make_nop(),
            [single] => reader.read_expr(single)?,
            many => {
                let list = reader.read_list(many)?;
                reader.builder().make_block(None, list)
            }
        };
        if result.is_concrete() {
            reader.expect_type(body, result, field.span, "function body")?;
        }
        reader.func.body = body;
        Ok(reader.func)
    }

    fn builder(&mut self) -> Builder<'_> {
        Builder::new(&mut self.func)
    }

    fn err<T>(&self, message: impl Into<String>, span: Span) -> Result<T> {
        Err(ArborError::read(message, span))
    }

    fn expect_type(&self, id: ExprId, ty: Type, span: Span, what: &str) -> Result<()> {
        let actual = self.func[id].ty;
        if actual == ty || actual == Type::Unreachable {
            Ok(())
        } else {
            self.err(format!("{what} must be {ty}, found {actual}"), span)
        }
    }

    /// Read a statement list; every element but the last must leave no value
    fn read_list(&mut self, items: &[Spanned<SExpr>]) -> Result<Vec<ExprId>> {
        let mut list = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let id = self.read_expr(item)?;
            if i + 1 < items.len() && self.func[id].ty.is_concrete() {
                return self.err(
                    format!("value of type {} is discarded implicitly; wrap it in `drop`", self.func[id].ty),
                    item.span,
                );
            }
            list.push(id);
        }
        Ok(list)
    }

    fn read_exprs(&mut self, items: &[Spanned<SExpr>]) -> Result<Vec<ExprId>> {
        items.iter().map(|item| self.read_expr(item)).collect()
    }

    fn bind_label(&mut self, item: Option<&Spanned<SExpr>>, is_loop: bool) -> Result<Option<Label>> {
        let Some(item) = item else { return Ok(None) };
        let Some(name) = item.node.as_label() else { return Ok(None) };
        let label = Label::new(name);
        if !self.defined.insert(label.clone()) {
            return self.err(format!("duplicate label `{label}`"), item.span);
        }
        self.scope.push((label.clone(), is_loop));
        Ok(Some(label))
    }

    /// Resolve a jump target; returns whether it names a loop
    fn resolve_label(&self, item: &Spanned<SExpr>) -> Result<(Label, bool)> {
        let Some(name) = item.node.as_label() else {
            return self.err(format!("expected a label, found {}", item.node.describe()), item.span);
        };
        match self.scope.iter().rev().find(|(label, _)| label.as_str() == name) {
            Some((label, is_loop)) => Ok((label.clone(), *is_loop)),
            None => self.err(format!("unknown label `${name}`"), item.span),
        }
    }

    fn arity(&self, items: &[Spanned<SExpr>], expected: usize, span: Span) -> Result<()> {
        if items.len() == expected {
            Ok(())
        } else {
            let head = items.first().and_then(|i| i.node.as_atom()).unwrap_or("expression");
            self.err(format!("`{head}` expects {} operand(s), found {}", expected - 1, items.len() - 1), span)
        }
    }

    fn read_expr(&mut self, node: &Spanned<SExpr>) -> Result<ExprId> {
        let items = list_of(node)?;
        let Some(head) = node.node.head() else {
            return self.err("expected an expression", node.span);
        };
        let span = node.span;
        let args = &items[1..];

        match head {
            "nop" => {
                self.arity(items, 1, span)?;
                Ok(self.builder().make_nop())
            }
            "unreachable" => {
                self.arity(items, 1, span)?;
                Ok(self.builder().make_unreachable())
            }
            "local.get" | "local.set" => {
                let index = match args.first().map(|a| &a.node) {
                    Some(SExpr::Int(n)) => u32::try_from(*n).ok().filter(|i| (*i as usize) < self.func.num_locals()),
                    _ => None,
                };
                let Some(index) = index else {
                    return self.err(format!("`{head}` needs a valid local index"), span);
                };
                let local_ty = self.func.local_type(index).unwrap_or(Type::None);
                if head == "local.get" {
                    self.arity(items, 2, span)?;
                    return Ok(self.builder().make_local_get(index));
                }
                self.arity(items, 3, span)?;
                let value = self.read_expr(&args[1])?;
                self.expect_type(value, local_ty, args[1].span, "assigned value")?;
                Ok(self.builder().make_local_set(index, value))
            }
            "global.get" | "global.set" => {
                let name = label_at(items, 1, span)?;
                let Some(global) = self.module.global(&name) else {
                    return self.err(format!("unknown global `${name}`"), span);
                };
                let ty = global.ty;
                if head == "global.get" {
                    self.arity(items, 2, span)?;
                    return Ok(self.builder().make_global_get(name, ty));
                }
                self.arity(items, 3, span)?;
                let value = self.read_expr(&args[1])?;
                self.expect_type(value, ty, args[1].span, "assigned value")?;
                Ok(self.builder().make_global_set(name, value))
            }
            "block" => {
                let name = self.bind_label(args.first(), false)?;
                let rest = if name.is_some() { &args[1..] } else { args };
                let (declared, rest) = result_clause(rest)?;
                let list = self.read_list(rest)?;
                if name.is_some() {
                    self.scope.pop();
                }
                Ok(match declared {
                    Some(ty) => self.builder().make_block_with(name, list, ty),
                    None => self.builder().make_block(name, list),
                })
            }
            "loop" => {
                let name = self.bind_label(args.first(), true)?;
                let rest = if name.is_some() { &args[1..] } else { args };
                let (_, rest) = result_clause(rest)?;
                let body = match rest {
                    [single] => self.read_expr(single)?,
                    many => {
                        let list = self.read_list(many)?;
                        self.builder().make_block(None, list)
                    }
                };
                if name.is_some() {
                    self.scope.pop();
                }
                Ok(self.builder().make_loop(name, body))
            }
            "if" => {
                let (_, rest) = result_clause(args)?;
                if !(2..=3).contains(&rest.len()) {
                    return self.err("`if` expects a condition and one or two arms", span);
                }
                let condition = self.read_expr(&rest[0])?;
                self.expect_type(condition, Type::I32, rest[0].span, "condition")?;
                let if_true = self.read_expr(&rest[1])?;
                let if_false = rest.get(2).map(|arm| self.read_expr(arm)).transpose()?;
                Ok(self.builder().make_if(condition, if_true, if_false))
            }
            "br" | "br_if" => {
                let Some(target) = args.first() else {
                    return self.err(format!("`{head}` needs a label"), span);
                };
                let (name, is_loop) = self.resolve_label(target)?;
                let mut operands = self.read_exprs(&args[1..])?;
                let condition = if head == "br_if" {
                    let Some(condition) = operands.pop() else {
                        return self.err("`br_if` needs a condition", span);
                    };
                    self.expect_type(condition, Type::I32, span, "condition")?;
                    Some(condition)
                } else {
                    None
                };
                if operands.len() > 1 || (is_loop && !operands.is_empty()) {
                    return self.err(format!("too many operands for `{head}` to `{name}`"), span);
                }
                Ok(self.builder().make_break(name, operands.pop(), condition))
            }
            "br_table" => {
                let labels = args.iter().take_while(|a| a.node.as_label().is_some()).count();
                if labels == 0 {
                    return self.err("`br_table` needs at least one label", span);
                }
                let mut targets = args[..labels]
                    .iter()
                    .map(|a| self.resolve_label(a).map(|(label, _)| label))
                    .collect::<Result<Vec<_>>>()?;
                let mut operands = self.read_exprs(&args[labels..])?;
                let condition = match operands.pop() {
                    Some(condition) if operands.len() <= 1 => condition,
                    _ => return self.err("`br_table` expects an optional value and a condition", span),
                };
                self.expect_type(condition, Type::I32, span, "condition")?;
                let Some(default) = targets.pop() else {
                    return self.err("`br_table` needs a default label", span);
                };
                Ok(self.builder().make_switch(targets, default, operands.pop(), condition))
            }
            "drop" => {
                self.arity(items, 2, span)?;
                let value = self.read_expr(&args[0])?;
                Ok(self.builder().make_drop(value))
            }
            "return" => {
                let value = match args {
                    [] => None,
                    [value] => Some(self.read_expr(value)?),
                    _ => return self.err("`return` takes at most one operand", span),
                };
                if let Some(value) = value {
                    let result = self.func.result;
                    self.expect_type(value, result, span, "returned value")?;
                }
                Ok(self.builder().make_return(value))
            }
            "select" => {
                self.arity(items, 4, span)?;
                let operands = self.read_exprs(args)?;
                self.expect_type(operands[2], Type::I32, args[2].span, "condition")?;
                let if_true_ty = self.func[operands[0]].ty;
                if if_true_ty.is_concrete() {
                    self.expect_type(operands[1], if_true_ty, args[1].span, "select arm")?;
                }
                Ok(self.builder().make_select(operands[0], operands[1], operands[2]))
            }
            "call" => {
                let target = label_at(items, 1, span)?;
                let Some(&(arity, result)) = self.signatures.callables.get(&target) else {
                    return self.err(format!("unknown function `${target}`"), span);
                };
                let operands = self.read_exprs(&args[1..])?;
                if operands.len() != arity {
                    return self.err(format!("`${target}` takes {arity} argument(s), found {}", operands.len()), span);
                }
                Ok(self.builder().make_call(target, operands, result))
            }
            "call_indirect" => {
                let (result, rest) = result_clause(args)?;
                let mut operands = self.read_exprs(rest)?;
                let Some(target) = operands.pop() else {
                    return self.err("`call_indirect` needs a target", span);
                };
                self.expect_type(target, Type::I32, span, "call target")?;
                Ok(self.builder().make_call_indirect(operands, target, result.unwrap_or(Type::None)))
            }
            _ if head.ends_with(".const") => self.read_const(head, items, span),
            _ => self.read_operator(head, items, span),
        }
    }

    fn read_const(&mut self, head: &str, items: &[Spanned<SExpr>], span: Span) -> Result<ExprId> {
        self.arity(items, 2, span)?;
        let literal = match (head, &items[1].node) {
            ("i32.const", SExpr::Int(n)) => i32::try_from(*n)
                .ok()
                .or_else(|| u32::try_from(*n).ok().map(|u| u as i32))
                .map(Literal::I32),
            ("i64.const", SExpr::Int(n)) => Some(Literal::I64(*n)),
            ("f32.const", SExpr::Int(n)) => Some(Literal::F32(*n as f32)),
            ("f32.const", SExpr::Float(x)) => Some(Literal::F32(*x as f32)),
            ("f64.const", SExpr::Int(n)) => Some(Literal::F64(*n as f64)),
            ("f64.const", SExpr::Float(x)) => Some(Literal::F64(*x)),
            _ => None,
        };
        match literal {
            Some(literal) => Ok(self.builder().make_const(literal)),
            None => self.err(format!("invalid `{head}` literal {}", items[1].node.describe()), items[1].span),
        }
    }

    /// `T.unop`, `T.binop`, loads, stores and atomics
    fn read_operator(&mut self, head: &str, items: &[Spanned<SExpr>], span: Span) -> Result<ExprId> {
        let args = &items[1..];
        let Some((prefix, rest)) = head.split_once('.') else {
            return self.err(format!("unknown expression `{head}`"), span);
        };
        let Some(ty) = Type::from_name(prefix) else {
            return self.err(format!("unknown expression `{head}`"), span);
        };

        if let Some(op) = UnaryOp::from_name(head) {
            self.arity(items, 2, span)?;
            let value = self.read_expr(&args[0])?;
            self.expect_type(value, op.operand, args[0].span, "operand")?;
            return Ok(self.builder().make_unary(op, value));
        }
        if let Some(op) = BinaryOp::from_name(head) {
            self.arity(items, 3, span)?;
            let left = self.read_expr(&args[0])?;
            self.expect_type(left, op.ty, args[0].span, "operand")?;
            let right = self.read_expr(&args[1])?;
            self.expect_type(right, op.ty, args[1].span, "operand")?;
            return Ok(self.builder().make_binary(op, left, right));
        }

        let operands = self.read_exprs(args)?;
        if let Some(&ptr) = operands.first() {
            self.expect_type(ptr, Type::I32, args[0].span, "address")?;
        }
        for (operand, item) in operands.iter().zip(args).skip(1) {
            self.expect_type(*operand, ty, item.span, "operand")?;
        }
        let rmw_op = rest.strip_prefix("atomic.rmw.").and_then(AtomicRmwOp::from_name);
        let expected = match rest {
            "load" | "atomic.load" => 1,
            "store" | "atomic.store" => 2,
            "atomic.rmw.cmpxchg" => 3,
            _ if rmw_op.is_some() => 2,
            _ => return self.err(format!("unknown expression `{head}`"), span),
        };
        if rest.starts_with("atomic.rmw.") && !ty.is_integer() {
            return self.err(format!("`{head}` needs an integer type"), span);
        }
        self.arity(items, expected + 1, span)?;

        let mut b = Builder::new(&mut self.func);
        Ok(match (rest, operands.as_slice()) {
            ("load", &[ptr]) => b.make_load(ty, ptr, false),
            ("atomic.load", &[ptr]) => b.make_load(ty, ptr, true),
            ("store", &[ptr, value]) => b.make_store(ty, ptr, value, false),
            ("atomic.store", &[ptr, value]) => b.make_store(ty, ptr, value, true),
            ("atomic.rmw.cmpxchg", &[ptr, expected, replacement]) => {
                b.make_atomic_cmpxchg(ty, ptr, expected, replacement)
            }
            (_, &[ptr, value]) => match rmw_op {
                Some(op) => b.make_atomic_rmw(op, ty, ptr, value),
                None => return Err(ArborError::read(format!("unknown expression `{head}`"), span)),
            },
            _ => return Err(ArborError::read(format!("unknown expression `{head}`"), span)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ExprKind;

    fn read_err(source: &str) -> String {
        read_module(source).unwrap_err().message().to_string()
    }

    #[test]
    fn test_read_single_expression_body() {
        let func = read_function("(func $f (result i32) (i32.add (i32.const 1) (i32.const 2)))").unwrap();
        assert_eq!(func.name, "f");
        assert_eq!(func.result, Type::I32);
        assert!(matches!(func[func.body].kind, ExprKind::Binary { .. }));
        assert_eq!(func[func.body].ty, Type::I32);
    }

    #[test]
    fn test_read_multiple_expressions_wrap_in_block() {
        let func = read_function("(func $f (nop) (nop))").unwrap();
        assert!(matches!(func[func.body].kind, ExprKind::Block { name: None, .. }));
        assert_eq!(func.block_list(func.body).len(), 2);
    }

    #[test]
    fn test_read_module_fields() {
        let module = read_module(
            "(module
               (import $log (param i32))
               (global $counter i64)
               (func $a (call $b))
               (func $b))",
        )
        .unwrap();
        assert_eq!(module.imports[0].params, vec![Type::I32]);
        assert_eq!(module.globals[0].ty, Type::I64);
        assert_eq!(module.functions.len(), 2);
    }

    #[test]
    fn test_read_params_and_locals() {
        let func = read_function("(func $f (param i32 i64) (param f32) (local f64) (local.get 3))").unwrap();
        assert_eq!(func.params, vec![Type::I32, Type::I64, Type::F32]);
        assert_eq!(func.locals, vec![Type::F64]);
        assert_eq!(func[func.body].ty, Type::F64);
    }

    #[test]
    fn test_declared_block_type_is_kept() {
        let func = read_function("(func $f (result i32) (block (result i32) (unreachable)))").unwrap();
        assert_eq!(func[func.body].ty, Type::I32);
    }

    #[test]
    fn test_br_if_with_and_without_value() {
        let func = read_function(
            "(func $f (param i32) (result i32)
               (block $out (result i32)
                 (drop (br_if $out (i32.const 0) (local.get 0)))
                 (i32.const 1)))",
        )
        .unwrap();
        let drop = func.block_list(func.body)[0];
        let br_if = func.child(drop, 0).unwrap();
        assert_eq!(func[br_if].ty, Type::I32);
        assert_eq!(func[func.body].ty, Type::I32);

        let func = read_function(
            "(func $f (param i32)
               (block $out (br_if $out (local.get 0)) (nop)))",
        )
        .unwrap();
        let br_if = func.block_list(func.body)[0];
        assert!(matches!(func[br_if].kind, ExprKind::Break { value: None, condition: Some(_), .. }));
    }

    #[test]
    fn test_br_table_default_is_last_label() {
        let func = read_function("(func $f (block $a (block $b (br_table $a $b (i32.const 0)))))").unwrap();
        let inner = func.block_list(func.body)[0];
        let switch = func.block_list(inner)[0];
        let ExprKind::Switch { targets, default, value, .. } = &func[switch].kind else {
            panic!("expected br_table");
        };
        assert_eq!(targets, &vec![Label::new("a")]);
        assert_eq!(default, &Label::new("b"));
        assert!(value.is_none());
    }

    #[test]
    fn test_atomic_forms() {
        let func = read_function(
            "(func $f (result i32)
               (i32.atomic.rmw.cmpxchg (i32.const 0) (i32.const 1) (i32.atomic.rmw.xchg (i32.const 4) (i32.const 2))))",
        )
        .unwrap();
        assert!(matches!(func[func.body].kind, ExprKind::AtomicCmpxchg { .. }));
    }

    #[test]
    fn test_float_atomic_rmw_is_rejected() {
        let message = read_err("(func $f (result f32) (f32.atomic.rmw.add (i32.const 0) (f32.const 1)))");
        assert!(message.contains("integer type"));
    }

    #[test]
    fn test_unknown_label_is_rejected() {
        assert!(read_err("(func $f (br $nowhere))").contains("unknown label"));
    }

    #[test]
    fn test_label_out_of_scope_is_rejected() {
        assert!(read_err("(func $f (block $a (nop)) (br $a))").contains("unknown label"));
    }

    #[test]
    fn test_duplicate_label_is_rejected() {
        assert!(read_err("(func $f (block $a (nop)) (block $a (nop)))").contains("duplicate label"));
    }

    #[test]
    fn test_implicit_discard_is_rejected() {
        assert!(read_err("(func $f (i32.const 1) (nop))").contains("wrap it in `drop`"));
    }

    #[test]
    fn test_type_mismatch_is_rejected() {
        assert!(read_err("(func $f (result i32) (i32.add (i64.const 1) (i32.const 2)))").contains("must be i32"));
    }

    #[test]
    fn test_call_arity_is_checked() {
        assert!(read_err("(module (import $g (param i32)) (func $f (call $g)))").contains("takes 1 argument"));
    }

    #[test]
    fn test_unknown_operator_is_rejected() {
        let err = read_module("(func $f (i32.frobnicate (i32.const 1)))").unwrap_err();
        assert!(matches!(err, ArborError::Read { .. }));
    }

    #[test]
    fn test_i32_const_accepts_unsigned_range() {
        let func = read_function("(func $f (result i32) (i32.const 4294967295))").unwrap();
        assert!(matches!(func[func.body].kind, ExprKind::Const(Literal::I32(-1))));
    }
}
