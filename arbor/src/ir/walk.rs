//! Post-order traversal
//!
//! [`walk`] drives a [`Visitor`] over a subtree, children before parents.
//! A visitor may hand back a replacement node, which is written into the
//! parent's slot the visited node came from.

use super::{ExprId, Function};

const STACK_RED_ZONE: usize = 128 * 1024; // 128KB remaining triggers growth
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024; // Grow by 4MB each time

/// Per-node hook of a mutating traversal
pub trait Visitor {
    /// Called once per node after all of its children. Returning `Some`
    /// replaces the node in its parent.
    fn visit(&mut self, func: &mut Function, id: ExprId) -> Option<ExprId>;
}

/// Walk the subtree at `root` in post-order. Returns the node that now
/// occupies `root`'s position.
pub fn walk<V: Visitor + ?Sized>(func: &mut Function, root: ExprId, visitor: &mut V) -> ExprId {
    stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
        let children = func[root].kind.children();
        for (slot, child) in children.into_iter().enumerate() {
            let replacement = walk(func, child, visitor);
            if replacement != child {
                func.set_child(root, slot, replacement);
            }
        }
        visitor.visit(func, root).unwrap_or(root)
    })
}

/// Walk a whole function body, updating `func.body` if the root is replaced
pub fn walk_function<V: Visitor + ?Sized>(func: &mut Function, visitor: &mut V) {
    let body = func.body;
    func.body = walk(func, body, visitor);
}

/// Read-only post-order traversal
pub fn for_each_post<F: FnMut(&Function, ExprId)>(func: &Function, root: ExprId, f: &mut F) {
    stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
        for child in func[root].kind.children() {
            for_each_post(func, child, f);
        }
        f(func, root);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builder::Builder;
    use crate::ir::{ExprKind, Literal, Type};

    struct ConstBumper;

    impl Visitor for ConstBumper {
        fn visit(&mut self, func: &mut Function, id: ExprId) -> Option<ExprId> {
            match func[id].kind {
                ExprKind::Const(Literal::I32(n)) => Some(Builder::new(func).make_const(Literal::I32(n + 1))),
                _ => None,
            }
        }
    }

    #[test]
    fn test_post_order_visits_children_first() {
        let mut func = Function::new("f", vec![], vec![], Type::None);
        let mut b = Builder::new(&mut func);
        let one = b.make_const(Literal::I32(1));
        let drop = b.make_drop(one);
        let nop = b.make_nop();
        let block = b.make_block(None, vec![drop, nop]);
        func.body = block;

        let mut order = Vec::new();
        for_each_post(&func, func.body, &mut |_, id| order.push(id));
        assert_eq!(order, vec![one, drop, nop, block]);
    }

    #[test]
    fn test_replacement_lands_in_parent_slot() {
        let mut func = Function::new("f", vec![], vec![], Type::None);
        let mut b = Builder::new(&mut func);
        let one = b.make_const(Literal::I32(1));
        let drop = b.make_drop(one);
        func.body = drop;

        walk_function(&mut func, &mut ConstBumper);
        let value = func.child(func.body, 0).unwrap();
        assert_ne!(value, one);
        assert!(matches!(func[value].kind, ExprKind::Const(Literal::I32(2))));
    }

    #[test]
    fn test_root_replacement_updates_body() {
        let mut func = Function::new("f", vec![], vec![], Type::I32);
        let one = Builder::new(&mut func).make_const(Literal::I32(1));
        func.body = one;

        walk_function(&mut func, &mut ConstBumper);
        assert_ne!(func.body, one);
        assert!(matches!(func[func.body].kind, ExprKind::Const(Literal::I32(2))));
    }
}
