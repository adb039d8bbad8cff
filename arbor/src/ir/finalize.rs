//! Type finalization
//!
//! After a structural edit the edited node's type must be recomputed from
//! its current children. [`finalize`] does that for any kind;
//! [`finalize_block_with`] pins a block to a given type instead, which is how
//! rewrites keep the type of the construct they replaced.

use super::walk::for_each_post;
use super::{ExprId, ExprKind, Function, Label, Type};

/// Recompute the type of `id` from its children
pub fn finalize(func: &mut Function, id: ExprId) {
    let ty = compute_type(func, id);
    func[id].ty = ty;
    if ty == Type::None && func.is_block(id) {
        handle_unreachable(func, id);
    }
}

/// Force a block's type, then apply the unreachable rule if it is `none`
pub fn finalize_block_with(func: &mut Function, id: ExprId, ty: Type) {
    func[id].ty = ty;
    if ty == Type::None {
        handle_unreachable(func, id);
    }
}

/// A `none` block with an unreachable child never completes normally,
/// unless something jumps to its end.
fn handle_unreachable(func: &mut Function, id: ExprId) {
    let ExprKind::Block { name, list } = &func[id].kind else {
        return;
    };
    if !list.iter().any(|&child| func[child].ty == Type::Unreachable) {
        return;
    }
    let targeted = match name {
        Some(label) => !BranchSeeker::scan(func, id, label).types.is_empty(),
        None => false,
    };
    if !targeted {
        func[id].ty = Type::Unreachable;
    }
}

fn compute_type(func: &Function, id: ExprId) -> Type {
    let ty_of = |child: ExprId| func[child].ty;
    let any_unreachable = |children: &[ExprId]| children.iter().any(|&c| ty_of(c) == Type::Unreachable);

    match &func[id].kind {
        ExprKind::Nop => Type::None,
        ExprKind::Unreachable | ExprKind::Switch { .. } | ExprKind::Return { .. } => Type::Unreachable,
        ExprKind::Const(literal) => literal.ty(),
        // Declared types, fixed at construction
        ExprKind::LocalGet { .. } | ExprKind::GlobalGet { .. } => func[id].ty,
        ExprKind::LocalSet { value, .. } | ExprKind::GlobalSet { value, .. } | ExprKind::Drop { value } => {
            if ty_of(*value) == Type::Unreachable { Type::Unreachable } else { Type::None }
        }
        ExprKind::Block { name, list } => {
            let fallthrough = list.last().map_or(Type::None, |&last| ty_of(last));
            match name {
                None => fallthrough,
                Some(label) => {
                    let seeker = BranchSeeker::scan(func, id, label);
                    merge_types(std::iter::once(fallthrough).chain(seeker.types))
                }
            }
        }
        ExprKind::Loop { body, .. } => ty_of(*body),
        ExprKind::If { condition, if_true, if_false } => {
            if ty_of(*condition) == Type::Unreachable {
                return Type::Unreachable;
            }
            match if_false {
                None => Type::None,
                Some(if_false) => {
                    let (a, b) = (ty_of(*if_true), ty_of(*if_false));
                    if a == Type::Unreachable { b } else { a }
                }
            }
        }
        ExprKind::Break { value, condition, .. } => match condition {
            None => Type::Unreachable,
            Some(condition) if ty_of(*condition) == Type::Unreachable => Type::Unreachable,
            Some(_) => value.map_or(Type::None, ty_of),
        },
        ExprKind::Call { operands, result, .. } => {
            if any_unreachable(operands) { Type::Unreachable } else { *result }
        }
        ExprKind::CallIndirect { operands, target, result } => {
            if any_unreachable(operands) || ty_of(*target) == Type::Unreachable {
                Type::Unreachable
            } else {
                *result
            }
        }
        ExprKind::Unary { op, value } => {
            if ty_of(*value) == Type::Unreachable { Type::Unreachable } else { op.result }
        }
        ExprKind::Binary { op, left, right } => {
            if any_unreachable(&[*left, *right]) { Type::Unreachable } else { op.result() }
        }
        ExprKind::Select { if_true, if_false, condition } => {
            if any_unreachable(&[*if_true, *if_false, *condition]) {
                Type::Unreachable
            } else {
                ty_of(*if_true)
            }
        }
        ExprKind::Load { ty, ptr, .. } => {
            if ty_of(*ptr) == Type::Unreachable { Type::Unreachable } else { *ty }
        }
        ExprKind::Store { ptr, value, .. } => {
            if any_unreachable(&[*ptr, *value]) { Type::Unreachable } else { Type::None }
        }
        ExprKind::AtomicRmw { ty, ptr, value, .. } => {
            if any_unreachable(&[*ptr, *value]) { Type::Unreachable } else { *ty }
        }
        ExprKind::AtomicCmpxchg { ty, ptr, expected, replacement } => {
            if any_unreachable(&[*ptr, *expected, *replacement]) {
                Type::Unreachable
            } else {
                *ty
            }
        }
    }
}

/// Least upper bound ignoring `unreachable`; `unreachable` if nothing else.
/// Conflicting value types keep the first one seen.
pub fn merge_types(types: impl IntoIterator<Item = Type>) -> Type {
    types.into_iter().fold(Type::Unreachable, |acc, ty| match (acc, ty) {
        (acc, Type::Unreachable) => acc,
        (Type::Unreachable, ty) => ty,
        (acc, _) => acc,
    })
}

/// Collects the types flowing to a label through jumps that can actually
/// be taken (jumps whose own operands are unreachable never arrive).
pub struct BranchSeeker {
    pub types: Vec<Type>,
}

impl BranchSeeker {
    pub fn scan(func: &Function, root: ExprId, label: &Label) -> Self {
        let mut types = Vec::new();
        for_each_post(func, root, &mut |func, id| {
            let (value, reaches) = match &func[id].kind {
                ExprKind::Break { name, value, .. } if name == label => (*value, true),
                ExprKind::Switch { targets, default, value, .. } => {
                    (*value, default == label || targets.contains(label))
                }
                _ => return,
            };
            if !reaches || func[id].kind.children().iter().any(|&c| func[c].ty == Type::Unreachable) {
                return;
            }
            types.push(value.map_or(Type::None, |v| func[v].ty));
        });
        Self { types }
    }
}
