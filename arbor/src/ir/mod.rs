//! Structured tree IR
//!
//! A function body is a strict tree of [`Expr`] nodes stored in an
//! [`id_arena::Arena`] owned by the [`Function`]. Parents refer to children by
//! [`ExprId`]; rewriting a tree means rebinding those ids. Nodes that drop out
//! of the tree stay in the arena until the function itself is dropped.
//!
//! # Control flow
//!
//! - `Block` with a label is a jump target: a `Break` naming it continues
//!   just past the block, optionally carrying the block's value.
//! - `Loop` with a label is a jump target too, but jumps go to its start and
//!   never carry a value.
//! - `Switch` dispatches on an index to one of several labels.

pub mod builder;
pub mod effects;
pub mod finalize;
pub mod print;
pub mod read;
mod types;
pub mod walk;

pub use types::*;

use id_arena::{Arena, Id};
use std::fmt;
use std::ops::{Index, IndexMut};

/// Handle of an expression inside its function's arena
pub type ExprId = Id<Expr>;

/// Jump target name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(pub String);

impl Label {
    pub fn new(name: impl Into<String>) -> Self {
        Label(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.0)
    }
}

/// An expression node and its computed result type
#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Type,
}

impl Expr {
    pub fn new(kind: ExprKind, ty: Type) -> Self {
        Self { kind, ty }
    }
}

/// Expression kinds. Child fields are listed in evaluation order.
#[derive(Debug, Clone)]
pub enum ExprKind {
    Nop,
    Unreachable,
    Const(Literal),
    LocalGet {
        index: u32,
    },
    LocalSet {
        index: u32,
        value: ExprId,
    },
    GlobalGet {
        name: String,
    },
    GlobalSet {
        name: String,
        value: ExprId,
    },
    Block {
        name: Option<Label>,
        list: Vec<ExprId>,
    },
    Loop {
        name: Option<Label>,
        body: ExprId,
    },
    If {
        condition: ExprId,
        if_true: ExprId,
        if_false: Option<ExprId>,
    },
    /// `br` when `condition` is absent, `br_if` otherwise
    Break {
        name: Label,
        value: Option<ExprId>,
        condition: Option<ExprId>,
    },
    /// `br_table`
    Switch {
        targets: Vec<Label>,
        default: Label,
        value: Option<ExprId>,
        condition: ExprId,
    },
    Call {
        target: String,
        operands: Vec<ExprId>,
        result: Type,
    },
    CallIndirect {
        operands: Vec<ExprId>,
        target: ExprId,
        result: Type,
    },
    Unary {
        op: UnaryOp,
        value: ExprId,
    },
    Binary {
        op: BinaryOp,
        left: ExprId,
        right: ExprId,
    },
    Select {
        if_true: ExprId,
        if_false: ExprId,
        condition: ExprId,
    },
    Drop {
        value: ExprId,
    },
    Return {
        value: Option<ExprId>,
    },
    Load {
        ty: Type,
        ptr: ExprId,
        atomic: bool,
    },
    Store {
        ty: Type,
        ptr: ExprId,
        value: ExprId,
        atomic: bool,
    },
    AtomicRmw {
        op: AtomicRmwOp,
        ty: Type,
        ptr: ExprId,
        value: ExprId,
    },
    AtomicCmpxchg {
        ty: Type,
        ptr: ExprId,
        expected: ExprId,
        replacement: ExprId,
    },
}

impl ExprKind {
    /// Direct children in evaluation order
    pub fn children(&self) -> Vec<ExprId> {
        self.slots().into_iter().copied().collect()
    }

    fn slots(&self) -> Vec<&ExprId> {
        match self {
            ExprKind::Nop
            | ExprKind::Unreachable
            | ExprKind::Const(_)
            | ExprKind::LocalGet { .. }
            | ExprKind::GlobalGet { .. } => vec![],
            ExprKind::LocalSet { value, .. }
            | ExprKind::GlobalSet { value, .. }
            | ExprKind::Unary { value, .. }
            | ExprKind::Drop { value } => vec![value],
            ExprKind::Load { ptr, .. } => vec![ptr],
            ExprKind::Loop { body, .. } => vec![body],
            ExprKind::Block { list, .. } => list.iter().collect(),
            ExprKind::If { condition, if_true, if_false } => {
                let mut slots = vec![condition, if_true];
                slots.extend(if_false.as_ref());
                slots
            }
            ExprKind::Break { value, condition, .. } => value.iter().chain(condition.iter()).collect(),
            ExprKind::Switch { value, condition, .. } => value.iter().chain(std::iter::once(condition)).collect(),
            ExprKind::Call { operands, .. } => operands.iter().collect(),
            ExprKind::CallIndirect { operands, target, .. } => {
                operands.iter().chain(std::iter::once(target)).collect()
            }
            ExprKind::Binary { left, right, .. } => vec![left, right],
            ExprKind::Select { if_true, if_false, condition } => vec![if_true, if_false, condition],
            ExprKind::Return { value } => value.iter().collect(),
            ExprKind::Store { ptr, value, .. } | ExprKind::AtomicRmw { ptr, value, .. } => vec![ptr, value],
            ExprKind::AtomicCmpxchg { ptr, expected, replacement, .. } => vec![ptr, expected, replacement],
        }
    }

    /// Mutable child slots, in the same order as [`ExprKind::children`]
    pub fn children_mut(&mut self) -> Vec<&mut ExprId> {
        match self {
            ExprKind::Nop
            | ExprKind::Unreachable
            | ExprKind::Const(_)
            | ExprKind::LocalGet { .. }
            | ExprKind::GlobalGet { .. } => vec![],
            ExprKind::LocalSet { value, .. }
            | ExprKind::GlobalSet { value, .. }
            | ExprKind::Unary { value, .. }
            | ExprKind::Drop { value } => vec![value],
            ExprKind::Load { ptr, .. } => vec![ptr],
            ExprKind::Loop { body, .. } => vec![body],
            ExprKind::Block { list, .. } => list.iter_mut().collect(),
            ExprKind::If { condition, if_true, if_false } => {
                let mut slots = vec![condition, if_true];
                slots.extend(if_false.as_mut());
                slots
            }
            ExprKind::Break { value, condition, .. } => value.iter_mut().chain(condition.iter_mut()).collect(),
            ExprKind::Switch { value, condition, .. } => {
                value.iter_mut().chain(std::iter::once(condition)).collect()
            }
            ExprKind::Call { operands, .. } => operands.iter_mut().collect(),
            ExprKind::CallIndirect { operands, target, .. } => {
                operands.iter_mut().chain(std::iter::once(target)).collect()
            }
            ExprKind::Binary { left, right, .. } => vec![left, right],
            ExprKind::Select { if_true, if_false, condition } => vec![if_true, if_false, condition],
            ExprKind::Return { value } => value.iter_mut().collect(),
            ExprKind::Store { ptr, value, .. } | ExprKind::AtomicRmw { ptr, value, .. } => vec![ptr, value],
            ExprKind::AtomicCmpxchg { ptr, expected, replacement, .. } => vec![ptr, expected, replacement],
        }
    }

    /// Label defined by this node, for blocks and loops
    pub fn label(&self) -> Option<&Label> {
        match self {
            ExprKind::Block { name, .. } | ExprKind::Loop { name, .. } => name.as_ref(),
            _ => None,
        }
    }
}

/// A function and the arena holding its body
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub params: Vec<Type>,
    /// Locals declared after the parameters
    pub locals: Vec<Type>,
    pub result: Type,
    pub body: ExprId,
    pub exprs: Arena<Expr>,
}

impl Function {
    /// Create a function whose body is a `nop`
    pub fn new(name: impl Into<String>, params: Vec<Type>, locals: Vec<Type>, result: Type) -> Self {
        let mut exprs = Arena::new();
        let body = exprs.alloc(Expr::new(ExprKind::Nop, Type::None));
        Self {
            name: name.into(),
            params,
            locals,
            result,
            body,
            exprs,
        }
    }

    /// Type of a parameter or local by index
    pub fn local_type(&self, index: u32) -> Option<Type> {
        let index = index as usize;
        if index < self.params.len() {
            self.params.get(index).copied()
        } else {
            self.locals.get(index - self.params.len()).copied()
        }
    }

    pub fn num_locals(&self) -> usize {
        self.params.len() + self.locals.len()
    }

    /// Child list of a block, empty for any other kind
    pub fn block_list(&self, id: ExprId) -> &[ExprId] {
        match &self[id].kind {
            ExprKind::Block { list, .. } => list,
            _ => &[],
        }
    }

    pub fn is_block(&self, id: ExprId) -> bool {
        matches!(self[id].kind, ExprKind::Block { .. })
    }

    /// Child of `parent` at `slot` (see [`ExprKind::children`])
    pub fn child(&self, parent: ExprId, slot: usize) -> Option<ExprId> {
        self[parent].kind.slots().get(slot).map(|id| **id)
    }

    /// Rebind the child slot of `parent`; returns false if there is no such slot
    pub fn set_child(&mut self, parent: ExprId, slot: usize, child: ExprId) -> bool {
        match self[parent].kind.children_mut().into_iter().nth(slot) {
            Some(target) => {
                *target = child;
                true
            }
            None => false,
        }
    }

    /// Number of nodes reachable from the body
    pub fn size(&self) -> usize {
        let mut count = 0;
        walk::for_each_post(self, self.body, &mut |_, _| count += 1);
        count
    }
}

impl Index<ExprId> for Function {
    type Output = Expr;

    fn index(&self, id: ExprId) -> &Expr {
        &self.exprs[id]
    }
}

impl IndexMut<ExprId> for Function {
    fn index_mut(&mut self, id: ExprId) -> &mut Expr {
        &mut self.exprs[id]
    }
}

/// Signature of an imported function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub name: String,
    pub params: Vec<Type>,
    pub result: Type,
}

/// Module-level mutable global
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Global {
    pub name: String,
    pub ty: Type,
}

/// A module: imports, globals and defined functions
#[derive(Debug, Clone, Default)]
pub struct Module {
    pub imports: Vec<Import>,
    pub globals: Vec<Global>,
    pub functions: Vec<Function>,
}

impl Module {
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn function_mut(&mut self, name: &str) -> Option<&mut Function> {
        self.functions.iter_mut().find(|f| f.name == name)
    }

    pub fn import(&self, name: &str) -> Option<&Import> {
        self.imports.iter().find(|i| i.name == name)
    }

    pub fn global(&self, name: &str) -> Option<&Global> {
        self.globals.iter().find(|g| g.name == name)
    }
}
