//! Node construction
//!
//! Every `make_*` method allocates the node in the function's arena and
//! finalizes its type before returning the id.

use super::finalize::{finalize, finalize_block_with};
use super::{AtomicRmwOp, BinaryOp, Expr, ExprId, ExprKind, Function, Label, Literal, Type, UnaryOp};

/// Allocates finalized nodes in a function's arena
pub struct Builder<'a> {
    func: &'a mut Function,
}

impl<'a> Builder<'a> {
    pub fn new(func: &'a mut Function) -> Self {
        Self { func }
    }

    fn alloc(&mut self, kind: ExprKind) -> ExprId {
        let id = self.func.exprs.alloc(Expr::new(kind, Type::None));
        finalize(self.func, id);
        id
    }

    /// Allocate a node with a declared type that finalization does not derive
    fn alloc_typed(&mut self, kind: ExprKind, ty: Type) -> ExprId {
        self.func.exprs.alloc(Expr::new(kind, ty))
    }

    pub fn make_nop(&mut self) -> ExprId {
        self.alloc(ExprKind::Nop)
    }

    pub fn make_unreachable(&mut self) -> ExprId {
        self.alloc(ExprKind::Unreachable)
    }

    pub fn make_const(&mut self, literal: Literal) -> ExprId {
        self.alloc(ExprKind::Const(literal))
    }

    /// `local.get`; the type comes from the function's local declarations
    pub fn make_local_get(&mut self, index: u32) -> ExprId {
        let ty = self.func.local_type(index).unwrap_or(Type::None);
        self.alloc_typed(ExprKind::LocalGet { index }, ty)
    }

    pub fn make_local_set(&mut self, index: u32, value: ExprId) -> ExprId {
        self.alloc(ExprKind::LocalSet { index, value })
    }

    pub fn make_global_get(&mut self, name: impl Into<String>, ty: Type) -> ExprId {
        self.alloc_typed(ExprKind::GlobalGet { name: name.into() }, ty)
    }

    pub fn make_global_set(&mut self, name: impl Into<String>, value: ExprId) -> ExprId {
        self.alloc(ExprKind::GlobalSet {
            name: name.into(),
            value,
        })
    }

    pub fn make_block(&mut self, name: Option<Label>, list: Vec<ExprId>) -> ExprId {
        self.alloc(ExprKind::Block { name, list })
    }

    /// Block pinned to a declared type
    pub fn make_block_with(&mut self, name: Option<Label>, list: Vec<ExprId>, ty: Type) -> ExprId {
        let id = self.alloc_typed(ExprKind::Block { name, list }, ty);
        finalize_block_with(self.func, id, ty);
        id
    }

    /// Unnamed two-element block `left; right`
    pub fn make_sequence(&mut self, left: ExprId, right: ExprId) -> ExprId {
        self.make_block(None, vec![left, right])
    }

    pub fn make_loop(&mut self, name: Option<Label>, body: ExprId) -> ExprId {
        self.alloc(ExprKind::Loop { name, body })
    }

    pub fn make_if(&mut self, condition: ExprId, if_true: ExprId, if_false: Option<ExprId>) -> ExprId {
        self.alloc(ExprKind::If {
            condition,
            if_true,
            if_false,
        })
    }

    pub fn make_break(&mut self, name: Label, value: Option<ExprId>, condition: Option<ExprId>) -> ExprId {
        self.alloc(ExprKind::Break { name, value, condition })
    }

    pub fn make_switch(
        &mut self,
        targets: Vec<Label>,
        default: Label,
        value: Option<ExprId>,
        condition: ExprId,
    ) -> ExprId {
        self.alloc(ExprKind::Switch {
            targets,
            default,
            value,
            condition,
        })
    }

    pub fn make_call(&mut self, target: impl Into<String>, operands: Vec<ExprId>, result: Type) -> ExprId {
        self.alloc(ExprKind::Call {
            target: target.into(),
            operands,
            result,
        })
    }

    pub fn make_call_indirect(&mut self, operands: Vec<ExprId>, target: ExprId, result: Type) -> ExprId {
        self.alloc(ExprKind::CallIndirect {
            operands,
            target,
            result,
        })
    }

    pub fn make_unary(&mut self, op: UnaryOp, value: ExprId) -> ExprId {
        self.alloc(ExprKind::Unary { op, value })
    }

    pub fn make_binary(&mut self, op: BinaryOp, left: ExprId, right: ExprId) -> ExprId {
        self.alloc(ExprKind::Binary { op, left, right })
    }

    pub fn make_select(&mut self, if_true: ExprId, if_false: ExprId, condition: ExprId) -> ExprId {
        self.alloc(ExprKind::Select {
            if_true,
            if_false,
            condition,
        })
    }

    pub fn make_drop(&mut self, value: ExprId) -> ExprId {
        self.alloc(ExprKind::Drop { value })
    }

    pub fn make_return(&mut self, value: Option<ExprId>) -> ExprId {
        self.alloc(ExprKind::Return { value })
    }

    pub fn make_load(&mut self, ty: Type, ptr: ExprId, atomic: bool) -> ExprId {
        self.alloc(ExprKind::Load { ty, ptr, atomic })
    }

    pub fn make_store(&mut self, ty: Type, ptr: ExprId, value: ExprId, atomic: bool) -> ExprId {
        self.alloc(ExprKind::Store {
            ty,
            ptr,
            value,
            atomic,
        })
    }

    pub fn make_atomic_rmw(&mut self, op: AtomicRmwOp, ty: Type, ptr: ExprId, value: ExprId) -> ExprId {
        self.alloc(ExprKind::AtomicRmw { op, ty, ptr, value })
    }

    pub fn make_atomic_cmpxchg(
        &mut self,
        ty: Type,
        ptr: ExprId,
        expected: ExprId,
        replacement: ExprId,
    ) -> ExprId {
        self.alloc(ExprKind::AtomicCmpxchg {
            ty,
            ptr,
            expected,
            replacement,
        })
    }
}
