//! Block merging
//!
//! Merges blocks into their parent blocks, and moves blocks out of operand
//! positions so that they can be merged. For example
//!
//! ```text
//! (i32.store
//!   (i32.const 100)
//!   (block
//!     (call $foo)
//!     (i32.load (i32.const 200))))
//! ```
//!
//! becomes
//!
//! ```text
//! (block
//!   (call $foo)
//!   (i32.store
//!     (i32.const 100)
//!     (i32.load (i32.const 200))))
//! ```
//!
//! after which the outer block may itself be merged into an enclosing one.
//! Moving a later operand's statements ahead of an earlier operand is only
//! done when the two cannot observe each other.
//!
//! A dropped named block can be merged only after the values carried by
//! jumps to it are removed. [`ProblemFinder`] decides whether that is safe
//! and [`BreakValueDropper`] does it.

use tracing::{debug, trace};

use super::Pass;
use crate::config::PassOptions;
use crate::ir::builder::Builder;
use crate::ir::effects::EffectAnalyzer;
use crate::ir::finalize::{finalize, finalize_block_with};
use crate::ir::walk::{Visitor, for_each_post, walk, walk_function};
use crate::ir::{ExprId, ExprKind, Function, Label, Type};

/// Looks for reasons the values of jumps to `origin` cannot be removed.
///
/// Any `br_table` naming the label is a problem: the value it carries is
/// shared with its other targets. So is a value with side effects, and so
/// is any `br_if` whose fallthrough value is used (i.e. not dropped).
pub(crate) struct ProblemFinder<'a> {
    options: &'a PassOptions,
    origin: &'a Label,
    found_problem: bool,
    br_ifs: usize,
    dropped_br_ifs: usize,
}

impl<'a> ProblemFinder<'a> {
    pub(crate) fn new(options: &'a PassOptions, origin: &'a Label) -> Self {
        Self {
            options,
            origin,
            found_problem: false,
            br_ifs: 0,
            dropped_br_ifs: 0,
        }
    }

    pub(crate) fn scan(&mut self, func: &Function, root: ExprId) {
        for_each_post(func, root, &mut |func, id| self.visit(func, id));
    }

    fn visit(&mut self, func: &Function, id: ExprId) {
        match &func[id].kind {
            ExprKind::Break { name, value, condition } if name == self.origin => {
                if condition.is_some() {
                    self.br_ifs += 1;
                }
                if let Some(value) = value {
                    if EffectAnalyzer::new(self.options, func, *value).has_side_effects() {
                        self.found_problem = true;
                    }
                }
            }
            ExprKind::Drop { value } => {
                if let ExprKind::Break { name, condition: Some(_), .. } = &func[*value].kind {
                    if name == self.origin {
                        self.dropped_br_ifs += 1;
                    }
                }
            }
            ExprKind::Switch { targets, default, .. } => {
                if default == self.origin || targets.contains(self.origin) {
                    self.found_problem = true;
                }
            }
            _ => {}
        }
    }

    /// True if the values must stay
    pub(crate) fn found(&self) -> bool {
        assert!(
            self.br_ifs >= self.dropped_br_ifs,
            "counted {} dropped br_if to {} but only {} br_if",
            self.dropped_br_ifs,
            self.origin,
            self.br_ifs
        );
        self.found_problem || self.br_ifs > self.dropped_br_ifs
    }
}

/// Removes the values from jumps to `origin`, keeping their effects.
///
/// Creates new blocks while doing so, and runs the block flattener on every
/// block it passes.
pub(crate) struct BreakValueDropper<'a> {
    options: &'a PassOptions,
    origin: &'a Label,
}

impl<'a> BreakValueDropper<'a> {
    pub(crate) fn new(options: &'a PassOptions, origin: &'a Label) -> Self {
        Self { options, origin }
    }
}

impl Visitor for BreakValueDropper<'_> {
    fn visit(&mut self, func: &mut Function, id: ExprId) -> Option<ExprId> {
        if func.is_block(id) {
            optimize_block(func, id, self.options);
            return None;
        }
        match func[id].kind {
            ExprKind::Break { ref name, value: Some(value), .. } if name == self.origin => {
                if func[value].ty == Type::Unreachable {
                    // the jump is never reached
                    return Some(value);
                }
                if let ExprKind::Break { value, .. } = &mut func[id].kind {
                    *value = None;
                }
                finalize(func, id);
                let mut b = Builder::new(func);
                let drop = b.make_drop(value);
                Some(b.make_sequence(drop, id))
            }
            // A dropped br_if whose value was just removed is now a `none`
            // sequence, and unreachable code needs no drop either.
            ExprKind::Drop { value } if !func[value].ty.is_concrete() => Some(value),
            _ => None,
        }
    }
}

fn has_unreachable_child(func: &Function, block: ExprId) -> bool {
    func.block_list(block).iter().any(|&child| func[child].ty == Type::Unreachable)
}

fn set_block_list(func: &mut Function, block: ExprId, new_list: Vec<ExprId>) {
    if let ExprKind::Block { list, .. } = &mut func[block].kind {
        *list = new_list;
    }
}

/// Move `(drop (block ...))` into the block, stripping jump values first if
/// the block is named. Returns the block if that was done.
fn sink_drop(func: &mut Function, drop: ExprId, inner: ExprId, options: &PassOptions) -> Option<ExprId> {
    if has_unreachable_child(func, inner) {
        // moving unreachable code around can change types
        trace!("declined sinking drop into block with unreachable code");
        return None;
    }
    if let Some(label) = func[inner].kind.label().cloned() {
        let mut finder = ProblemFinder::new(options, &label);
        finder.scan(func, inner);
        if finder.found() {
            trace!(label = %label, "declined stripping jump values");
            return None;
        }
        walk(func, inner, &mut BreakValueDropper::new(options, &label));
        trace!(label = %label, "stripped jump values");
    }
    let back = *func.block_list(inner).last()?;

    if let ExprKind::Drop { value } = &mut func[drop].kind {
        *value = back;
    }
    finalize(func, drop);
    if let ExprKind::Block { list, .. } = &mut func[inner].kind {
        if let Some(last) = list.last_mut() {
            *last = drop;
        }
    }
    finalize(func, inner);
    Some(inner)
}

/// Flatten unnamed child blocks into `block`, to a fixed point.
/// Returns whether anything changed.
pub(crate) fn optimize_block(func: &mut Function, block: ExprId, options: &PassOptions) -> bool {
    let mut more = true;
    let mut changed = false;
    while more {
        more = false;
        let mut i = 0;
        while i < func.block_list(block).len() {
            let current = func.block_list(block)[i];
            let mut child = func.is_block(current).then_some(current);
            if child.is_none() {
                if let ExprKind::Drop { value } = func[current].kind {
                    if func.is_block(value) {
                        child = sink_drop(func, current, value, options);
                        if let Some(inner) = child {
                            let mut list = func.block_list(block).to_vec();
                            list[i] = inner;
                            set_block_list(func, block, list);
                            trace!("sank drop into block");
                            more = true;
                            changed = true;
                        }
                    }
                }
            }
            let Some(child) = child else {
                i += 1;
                continue;
            };
            // named blocks may be jump targets
            if func[child].kind.label().is_some() {
                i += 1;
                continue;
            }

            let list = func.block_list(block);
            let mut merged = Vec::with_capacity(list.len() + func.block_list(child).len());
            merged.extend_from_slice(&list[..i]);
            merged.extend_from_slice(func.block_list(child));
            merged.extend_from_slice(&list[i + 1..]);
            // a value merged into the middle must be dropped
            if let Some(&last) = merged.last() {
                for item in merged.iter_mut() {
                    if *item != last && func[*item].ty.is_concrete() {
                        *item = Builder::new(func).make_drop(*item);
                    }
                }
            }
            set_block_list(func, block, merged);
            trace!("flattened child block");
            more = true;
            changed = true;
            break;
        }
    }
    if changed {
        let ty = func[block].ty;
        finalize_block_with(func, block, ty);
    }
    changed
}

/// Post-order driver: flattens every block and hoists blocks out of operands
struct MergeBlocksVisitor<'a> {
    options: &'a PassOptions,
    replacement: Option<ExprId>,
    changed: bool,
}

impl MergeBlocksVisitor<'_> {
    /// Given
    ///
    /// ```text
    /// (curr (block (..more..) (back)) (..other children..))
    /// ```
    ///
    /// produce
    ///
    /// ```text
    /// (block (..more..) (curr (back) (..other children..)))
    /// ```
    ///
    /// so the block is on the outside and may merge further. `deps` are the
    /// slots of operands evaluated before `slot`, which the moved statements
    /// would now run ahead of. Returns the block now wrapping `curr`, if any.
    fn optimize(
        &mut self,
        func: &mut Function,
        curr: ExprId,
        slot: usize,
        outer: Option<ExprId>,
        deps: &[usize],
    ) -> Option<ExprId> {
        let Some(child) = func.child(curr, slot) else {
            return outer;
        };
        let deps: Vec<ExprId> = deps.iter().filter_map(|&dep| func.child(curr, dep)).collect();
        if !deps.is_empty() {
            let child_effects = EffectAnalyzer::new(self.options, func, child);
            for dep in deps {
                if EffectAnalyzer::new(self.options, func, dep).invalidates(&child_effects) {
                    trace!("declined hoist across a conflicting operand");
                    return outer;
                }
            }
        }

        let list = match &func[child].kind {
            ExprKind::Block { name: None, list } if list.len() >= 2 => list.clone(),
            _ => return outer,
        };
        if func[curr].ty == Type::None && has_unreachable_child(func, child) {
            // would turn a none into an unreachable
            trace!("declined hoisting unreachable code");
            return outer;
        }
        let back = list[list.len() - 1];
        if func[back].ty == Type::Unreachable {
            trace!("declined hoist, operand never completes");
            return outer;
        }
        if func[child].ty != func[back].ty {
            return outer;
        }

        func.set_child(curr, slot, back);
        self.changed = true;
        match outer {
            None => {
                let mut list = list;
                if let Some(last) = list.last_mut() {
                    *last = curr;
                }
                set_block_list(func, child, list);
                let ty = func[curr].ty;
                finalize_block_with(func, child, ty);
                trace!("hoisted block out of operand");
                self.replacement = Some(child);
                Some(child)
            }
            Some(outer) => {
                let mut outer_list = func.block_list(outer).to_vec();
                assert_eq!(outer_list.pop(), Some(curr), "hoisted block must end with the expression it wraps");
                outer_list.extend_from_slice(&list[..list.len() - 1]);
                outer_list.push(curr);
                set_block_list(func, outer, outer_list);
                trace!("hoisted operand statements into existing block");
                Some(outer)
            }
        }
    }

    /// Operands in order, stopping at the first with side effects
    fn optimize_in_order(&mut self, func: &mut Function, curr: ExprId, count: usize) {
        let mut outer = None;
        for slot in 0..count {
            let Some(operand) = func.child(curr, slot) else {
                return;
            };
            if EffectAnalyzer::new(self.options, func, operand).has_side_effects() {
                return;
            }
            outer = self.optimize(func, curr, slot, outer, &[]);
        }
    }

    /// First operand, then the second with the first as a dependency
    fn optimize_pair(&mut self, func: &mut Function, curr: ExprId, first: Option<usize>, second: usize) {
        let outer = match first {
            Some(first) => self.optimize(func, curr, first, None, &[]),
            None => None,
        };
        let deps: Vec<usize> = first.into_iter().collect();
        self.optimize(func, curr, second, outer, &deps);
    }
}

impl Visitor for MergeBlocksVisitor<'_> {
    fn visit(&mut self, func: &mut Function, id: ExprId) -> Option<ExprId> {
        match &func[id].kind {
            ExprKind::Block { .. } => {
                if optimize_block(func, id, self.options) {
                    self.changed = true;
                }
            }
            ExprKind::Unary { .. }
            | ExprKind::LocalSet { .. }
            | ExprKind::GlobalSet { .. }
            | ExprKind::Load { .. }
            | ExprKind::Return { .. }
            | ExprKind::Drop { .. } => {
                self.optimize(func, id, 0, None, &[]);
            }
            ExprKind::Binary { .. } | ExprKind::Store { .. } | ExprKind::AtomicRmw { .. } => {
                self.optimize_pair(func, id, Some(0), 1);
            }
            ExprKind::Break { value, condition, .. } => {
                // slots shift down when there is no value
                let value = value.map(|_| 0);
                let condition = condition.map(|_| value.map_or(0, |_| 1));
                match condition {
                    Some(condition) => self.optimize_pair(func, id, value, condition),
                    None => {
                        if let Some(value) = value {
                            self.optimize(func, id, value, None, &[]);
                        }
                    }
                }
            }
            ExprKind::Switch { value, .. } => {
                let value = value.map(|_| 0);
                let condition = value.map_or(0, |_| 1);
                self.optimize_pair(func, id, value, condition);
            }
            ExprKind::Select { .. } | ExprKind::AtomicCmpxchg { .. } => {
                self.optimize_in_order(func, id, 3);
            }
            ExprKind::Call { operands, .. } => {
                let count = operands.len();
                self.optimize_in_order(func, id, count);
            }
            ExprKind::CallIndirect { operands, .. } => {
                let count = operands.len() + 1;
                self.optimize_in_order(func, id, count);
            }
            _ => {}
        }
        self.replacement.take()
    }
}

/// Run block merging over one function. Returns whether anything changed.
pub fn optimize_function(func: &mut Function, options: &PassOptions) -> bool {
    let mut visitor = MergeBlocksVisitor {
        options,
        replacement: None,
        changed: false,
    };
    walk_function(func, &mut visitor);
    debug!(function = %func.name, changed = visitor.changed, "merge_blocks");
    visitor.changed
}

/// Block merging as a [`Pass`]
pub struct MergeBlocks;

impl Pass for MergeBlocks {
    fn name(&self) -> &'static str {
        "merge_blocks"
    }

    fn run_on_function(&self, func: &mut Function, options: &PassOptions) -> bool {
        optimize_function(func, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::print::print_expr;
    use crate::ir::read::read_function;

    fn optimized(source: &str) -> (String, bool) {
        let mut func = read_function(source).unwrap();
        let changed = optimize_function(&mut func, &PassOptions::default());
        (print_expr(&func, func.body), changed)
    }

    fn finder_on_body(source: &str, label: &str) -> bool {
        let func = read_function(source).unwrap();
        let label = Label::new(label);
        let options = PassOptions::default();
        let mut finder = ProblemFinder::new(&options, &label);
        finder.scan(&func, func.body);
        finder.found()
    }

    // ====================================================================
    // ProblemFinder
    // ====================================================================

    #[test]
    fn test_finder_accepts_dropped_br_if() {
        assert!(!finder_on_body(
            "(func $f (param i32) (result i32)
               (block $l (result i32)
                 (drop (br_if $l (i32.const 1) (local.get 0)))
                 (i32.const 2)))",
            "l"
        ));
    }

    #[test]
    fn test_finder_rejects_used_br_if_value() {
        assert!(finder_on_body(
            "(func $f (param i32) (result i32)
               (block $l (result i32)
                 (local.set 0 (br_if $l (i32.const 1) (local.get 0)))
                 (i32.const 2)))",
            "l"
        ));
    }

    #[test]
    fn test_finder_rejects_effectful_value() {
        assert!(finder_on_body(
            "(module (import $get (result i32))
               (func $f (result i32)
                 (block $l (result i32)
                   (br $l (call $get)))))",
            "l"
        ));
    }

    #[test]
    fn test_finder_rejects_switch_target() {
        assert!(finder_on_body(
            "(func $f (param i32) (result i32)
               (block $l (result i32)
                 (drop
                   (block $m (result i32)
                     (br_table $m $l (i32.const 3) (local.get 0))))
                 (i32.const 2)))",
            "l"
        ));
    }

    #[test]
    fn test_finder_ignores_other_labels() {
        assert!(!finder_on_body(
            "(func $f (param i32)
               (block $l
                 (block $m
                   (br_table $m (local.get 0)))
                 (nop)))",
            "l"
        ));
    }

    #[test]
    #[should_panic(expected = "dropped br_if")]
    fn test_finder_count_invariant() {
        let options = PassOptions::default();
        let label = Label::new("l");
        let mut finder = ProblemFinder::new(&options, &label);
        finder.dropped_br_ifs = 2;
        finder.br_ifs = 1;
        finder.found();
    }

    // ====================================================================
    // Block flattening
    // ====================================================================

    #[test]
    fn test_flatten_nested_unnamed_blocks() {
        let (text, changed) = optimized(
            "(func $f (param i32)
               (block
                 (nop)
                 (block (local.set 0 (i32.const 1)) (nop))
                 (nop)))",
        );
        assert!(changed);
        assert_eq!(text, "(block\n  (nop)\n  (local.set 0 (i32.const 1))\n  (nop)\n  (nop))");
    }

    #[test]
    fn test_flatten_last_block_keeps_value() {
        let (text, _) = optimized(
            "(func $f (result i32)
               (block (result i32)
                 (drop (i32.const 0))
                 (block (result i32) (nop) (i32.const 1))))",
        );
        assert_eq!(text, "(block (result i32)\n  (drop (i32.const 0))\n  (nop)\n  (i32.const 1))");
    }

    #[test]
    fn test_named_block_is_kept() {
        let (text, changed) = optimized(
            "(func $f (param i32)
               (block
                 (block $l (br_if $l (local.get 0)) (nop))
                 (nop)))",
        );
        assert!(!changed);
        assert!(text.contains("(block $l"));
    }

    #[test]
    fn test_empty_unnamed_block_is_spliced_out() {
        let (text, changed) = optimized("(func $f (block (nop) (block) (nop)))");
        assert!(changed);
        assert_eq!(text, "(block (nop) (nop))");
    }

    // ====================================================================
    // Dropped named blocks
    // ====================================================================

    #[test]
    fn test_dropped_named_block_loses_jump_values() {
        let (text, changed) = optimized(
            "(func $f (param i32)
               (block
                 (drop
                   (block $l (result i32)
                     (drop (br_if $l (i32.const 1) (local.get 0)))
                     (i32.const 2)))
                 (nop)))",
        );
        assert!(changed);
        assert_eq!(
            text,
            "(block\n  (block $l\n    (drop (i32.const 1))\n    (br_if $l (local.get 0))\n    (drop (i32.const 2)))\n  (nop))"
        );
    }

    #[test]
    fn test_unreachable_jump_value_replaces_jump() {
        let mut func = read_function(
            "(func $f (param i32) (result i32)
               (block $l (result i32)
                 (if (local.get 0) (br $l (unreachable)))
                 (i32.const 1)))",
        )
        .unwrap();
        let options = PassOptions::default();
        let label = Label::new("l");
        let body = func.body;
        let root = walk(&mut func, body, &mut BreakValueDropper::new(&options, &label));
        assert_eq!(root, body);
        let text = print_expr(&func, body);
        assert_eq!(text, "(block $l (result i32)\n  (if (local.get 0) (unreachable))\n  (i32.const 1))");
        assert!(!text.contains("br $l"));
    }

    #[test]
    fn test_switch_blocks_value_stripping() {
        let source = "(func $f (param i32)
               (block
                 (drop
                   (block $l (result i32)
                     (drop
                       (block $m (result i32)
                         (br_table $m $l (i32.const 3) (local.get 0))))
                     (i32.const 2)))
                 (nop)))";
        let (text, changed) = optimized(source);
        assert!(!changed);
        assert!(text.contains("(br_table $m $l"));
        assert!(text.contains("(drop\n"));
    }

    #[test]
    fn test_unnamed_dropped_block_is_merged() {
        let (text, _) = optimized(
            "(func $f (block (drop (block (result i32) (nop) (i32.const 5))) (nop)))",
        );
        assert_eq!(text, "(block\n  (nop)\n  (drop (i32.const 5))\n  (nop))");
    }

    #[test]
    fn test_dropped_block_with_unreachable_is_left_alone() {
        let (text, changed) = optimized(
            "(func $f (block (drop (block (result i32) (unreachable) (i32.const 5))) (nop)))",
        );
        assert!(!changed);
        assert!(text.contains("(unreachable)"));
    }

    // ====================================================================
    // Operand hoisting
    // ====================================================================

    #[test]
    fn test_hoist_out_of_unary() {
        let (text, changed) = optimized(
            "(func $f (param i32) (result i32)
               (i32.eqz (block (result i32) (local.set 0 (i32.const 1)) (local.get 0))))",
        );
        assert!(changed);
        assert_eq!(text, "(block (result i32)\n  (local.set 0 (i32.const 1))\n  (i32.eqz (local.get 0)))");
    }

    #[test]
    fn test_hoist_declined_across_conflicting_left_operand() {
        let (_, changed) = optimized(
            "(func $f (param i32) (result i32)
               (i32.add
                 (local.get 0)
                 (block (result i32) (local.set 0 (i32.const 1)) (local.get 0))))",
        );
        assert!(!changed);
    }

    #[test]
    fn test_hoist_both_operands_into_one_block() {
        let (text, _) = optimized(
            "(func $f (param i32 i32) (result i32)
               (i32.add
                 (block (result i32) (local.set 0 (i32.const 1)) (local.get 0))
                 (block (result i32) (local.set 1 (i32.const 2)) (local.get 1))))",
        );
        assert_eq!(
            text,
            "(block (result i32)\n  (local.set 0 (i32.const 1))\n  (local.set 1 (i32.const 2))\n  (i32.add (local.get 0) (local.get 1)))"
        );
    }

    #[test]
    fn test_select_stops_at_side_effects() {
        let (_, changed) = optimized(
            "(func $f (param i32) (result i32)
               (select
                 (block (result i32) (local.set 0 (i32.const 1)) (local.get 0))
                 (i32.const 2)
                 (local.get 0)))",
        );
        assert!(!changed);
    }

    #[test]
    fn test_in_order_hoists_before_side_effects_are_kept() {
        let mut func = read_function(
            "(func $f (param i32) (result i32)
               (i32.atomic.rmw.cmpxchg
                 (block (result i32) (nop) (i32.const 8))
                 (block (result i32) (local.set 0 (i32.const 1)) (local.get 0))
                 (block (result i32) (nop) (i32.const 2))))",
        )
        .unwrap();
        let options = PassOptions::default();
        assert!(optimize_function(&mut func, &options));
        let text = print_expr(&func, func.body);
        assert_eq!(
            text,
            "(block (result i32)\n  (nop)\n  (i32.atomic.rmw.cmpxchg\n    (i32.const 8)\n    (block (result i32)\n      (local.set 0 (i32.const 1))\n      (local.get 0))\n    (block (result i32) (nop) (i32.const 2))))"
        );
        assert!(!optimize_function(&mut func, &options));
        assert_eq!(print_expr(&func, func.body), text);
    }

    #[test]
    fn test_call_indirect_target_joins_operand_block() {
        let mut func = read_function(
            "(func $f (param i32) (result i32)
               (call_indirect (result i32)
                 (block (result i32) (nop) (local.get 0))
                 (block (result i32) (nop) (i32.const 0))))",
        )
        .unwrap();
        let options = PassOptions::default();
        assert!(optimize_function(&mut func, &options));
        let text = print_expr(&func, func.body);
        assert_eq!(
            text,
            "(block (result i32)\n  (nop)\n  (nop)\n  (call_indirect (result i32) (local.get 0) (i32.const 0)))"
        );
        assert!(!optimize_function(&mut func, &options));
        assert_eq!(print_expr(&func, func.body), text);
    }

    #[test]
    fn test_br_if_condition_hoisted_without_value() {
        let (text, changed) = optimized(
            "(func $f
               (block $l
                 (br_if $l (block (result i32) (nop) (i32.const 1)))))",
        );
        assert!(changed);
        assert_eq!(text, "(block $l\n  (nop)\n  (br_if $l (i32.const 1)))");
    }

    #[test]
    fn test_second_run_changes_nothing() {
        let mut func = read_function(
            "(func $f (param i32 i32) (result i32)
               (i32.add
                 (block (result i32) (local.set 0 (i32.const 1)) (local.get 0))
                 (block (result i32) (local.set 1 (i32.const 2)) (local.get 1))))",
        )
        .unwrap();
        let options = PassOptions::default();
        assert!(optimize_function(&mut func, &options));
        let once = print_expr(&func, func.body);
        assert!(!optimize_function(&mut func, &options));
        assert_eq!(print_expr(&func, func.body), once);
    }
}
