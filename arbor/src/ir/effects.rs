//! Side-effect analysis
//!
//! Summarizes what evaluating a subtree may observe or change, so callers
//! can ask whether it has side effects at all, or whether moving it across
//! another subtree could change behavior.

use std::collections::HashSet;

use super::walk::for_each_post;
use super::{ExprId, ExprKind, Function, Label};
use crate::config::PassOptions;

#[derive(Debug, Clone, Default)]
pub struct EffectAnalyzer {
    ignore_implicit_traps: bool,
    /// Control may leave the subtree other than by falling through
    pub branches: bool,
    pub calls: bool,
    pub locals_read: HashSet<u32>,
    pub locals_written: HashSet<u32>,
    pub globals_read: HashSet<String>,
    pub globals_written: HashSet<String>,
    pub reads_memory: bool,
    pub writes_memory: bool,
    /// A load, store, division or truncation that may trap
    pub implicit_trap: bool,
    pub is_atomic: bool,
    /// Labels jumped to but not (yet) seen defined inside the subtree
    break_names: HashSet<Label>,
}

impl EffectAnalyzer {
    pub fn new(options: &PassOptions, func: &Function, root: ExprId) -> Self {
        let mut analyzer = Self {
            ignore_implicit_traps: options.ignore_implicit_traps,
            ..Self::default()
        };
        for_each_post(func, root, &mut |func, id| analyzer.visit(func, id));
        if !analyzer.break_names.is_empty() {
            analyzer.branches = true;
        }
        analyzer
    }

    fn visit(&mut self, func: &Function, id: ExprId) {
        match &func[id].kind {
            ExprKind::Block { name: Some(name), .. } | ExprKind::Loop { name: Some(name), .. } => {
                self.break_names.remove(name);
            }
            ExprKind::Break { name, .. } => {
                self.break_names.insert(name.clone());
            }
            ExprKind::Switch { targets, default, .. } => {
                self.break_names.extend(targets.iter().cloned());
                self.break_names.insert(default.clone());
            }
            ExprKind::Call { .. } | ExprKind::CallIndirect { .. } => self.calls = true,
            ExprKind::LocalGet { index } => {
                self.locals_read.insert(*index);
            }
            ExprKind::LocalSet { index, .. } => {
                self.locals_written.insert(*index);
            }
            ExprKind::GlobalGet { name } => {
                self.globals_read.insert(name.clone());
            }
            ExprKind::GlobalSet { name, .. } => {
                self.globals_written.insert(name.clone());
            }
            ExprKind::Load { atomic, .. } => {
                self.reads_memory = true;
                self.is_atomic |= *atomic;
                self.note_implicit_trap();
            }
            ExprKind::Store { atomic, .. } => {
                self.writes_memory = true;
                self.is_atomic |= *atomic;
                self.note_implicit_trap();
            }
            ExprKind::AtomicRmw { .. } | ExprKind::AtomicCmpxchg { .. } => {
                self.reads_memory = true;
                self.writes_memory = true;
                self.is_atomic = true;
                self.note_implicit_trap();
            }
            ExprKind::Unary { op, .. } if op.may_trap() => self.note_implicit_trap(),
            ExprKind::Binary { op, .. } if op.may_trap() => self.note_implicit_trap(),
            ExprKind::Return { .. } | ExprKind::Unreachable => self.branches = true,
            _ => {}
        }
    }

    fn note_implicit_trap(&mut self) {
        if !self.ignore_implicit_traps {
            self.implicit_trap = true;
        }
    }

    pub fn accesses_memory(&self) -> bool {
        self.calls || self.reads_memory || self.writes_memory
    }

    pub fn accesses_global(&self) -> bool {
        !self.globals_read.is_empty() || !self.globals_written.is_empty()
    }

    pub fn has_global_side_effects(&self) -> bool {
        self.calls || !self.globals_written.is_empty() || self.writes_memory || self.is_atomic
    }

    pub fn has_side_effects(&self) -> bool {
        self.calls
            || !self.locals_written.is_empty()
            || self.writes_memory
            || self.branches
            || !self.globals_written.is_empty()
            || self.implicit_trap
            || self.is_atomic
    }

    /// Whether reordering the code summarized by `self` and `other` relative
    /// to each other could change observable behavior
    pub fn invalidates(&self, other: &EffectAnalyzer) -> bool {
        if self.branches
            || other.branches
            || ((self.writes_memory || self.calls) && other.accesses_memory())
            || (self.accesses_memory() && (other.writes_memory || other.calls))
        {
            return true;
        }
        // atomics are ordered with respect to every memory access
        if (self.is_atomic && other.accesses_memory()) || (other.is_atomic && self.accesses_memory()) {
            return true;
        }
        if self
            .locals_written
            .iter()
            .any(|l| other.locals_written.contains(l) || other.locals_read.contains(l))
            || self.locals_read.iter().any(|l| other.locals_written.contains(l))
        {
            return true;
        }
        if (self.accesses_global() && other.calls) || (other.accesses_global() && self.calls) {
            return true;
        }
        if self
            .globals_written
            .iter()
            .any(|g| other.globals_written.contains(g) || other.globals_read.contains(g))
            || self.globals_read.iter().any(|g| other.globals_written.contains(g))
        {
            return true;
        }
        // traps may be reordered, but not made conditional or moved across
        // state changes someone could observe afterwards
        if (self.implicit_trap && other.branches) || (other.implicit_trap && self.branches) {
            return true;
        }
        (self.implicit_trap && other.has_global_side_effects())
            || (other.implicit_trap && self.has_global_side_effects())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::read::read_function;

    fn effects(source: &str) -> EffectAnalyzer {
        effects_with(source, &PassOptions::default())
    }

    fn effects_with(source: &str, options: &PassOptions) -> EffectAnalyzer {
        let func = read_function(source).unwrap();
        EffectAnalyzer::new(options, &func, func.body)
    }

    #[test]
    fn test_pure_arithmetic_has_no_effects() {
        let e = effects("(func $f (param i32) (result i32) (i32.add (local.get 0) (i32.const 1)))");
        assert!(!e.has_side_effects());
        assert!(e.locals_read.contains(&0));
    }

    #[test]
    fn test_call_has_effects() {
        let e = effects("(module (import $foo) (func $f (call $foo)))");
        assert!(e.calls);
        assert!(e.has_side_effects());
    }

    #[test]
    fn test_load_traps_unless_ignored() {
        let source = "(func $f (result i32) (i32.load (i32.const 8)))";
        assert!(effects(source).has_side_effects());
        let relaxed = PassOptions { ignore_implicit_traps: true };
        let e = effects_with(source, &relaxed);
        assert!(e.reads_memory);
        assert!(!e.has_side_effects());
    }

    #[test]
    fn test_internal_break_is_not_a_branch() {
        let e = effects("(func $f (block $l (br_if $l (i32.const 1)) (nop)))");
        assert!(!e.branches);
        assert!(!e.has_side_effects());
    }

    #[test]
    fn test_escaping_break_is_a_branch() {
        let func = read_function("(func $f (block $l (br_if $l (i32.const 1))))").unwrap();
        let br_if = func.block_list(func.body)[0];
        let e = EffectAnalyzer::new(&PassOptions::default(), &func, br_if);
        assert!(e.branches);
    }

    #[test]
    fn test_store_invalidates_load() {
        let relaxed = PassOptions { ignore_implicit_traps: true };
        let store = effects_with("(func $f (i32.store (i32.const 0) (i32.const 1)))", &relaxed);
        let load = effects_with("(func $f (result i32) (i32.load (i32.const 0)))", &relaxed);
        assert!(store.invalidates(&load));
        assert!(load.invalidates(&store));
        assert!(!load.invalidates(&load));
    }

    #[test]
    fn test_local_conflicts() {
        let write = effects("(func $f (param i32) (local.set 0 (i32.const 1)))");
        let read = effects("(func $f (param i32) (result i32) (local.get 0))");
        let other = effects("(func $f (param i32 i32) (result i32) (local.get 1))");
        assert!(write.invalidates(&read));
        assert!(read.invalidates(&write));
        assert!(!write.invalidates(&other));
    }

    #[test]
    fn test_globals_conflict_with_calls() {
        let global = effects("(module (global $g i32) (func $f (result i32) (global.get $g)))");
        let call = effects("(module (import $foo) (func $f (call $foo)))");
        assert!(global.invalidates(&call));
        assert!(!global.has_side_effects());
    }

    #[test]
    fn test_trap_invalidates_global_write() {
        let trap = effects("(func $f (param i32) (result i32) (i32.div_s (local.get 0) (local.get 0)))");
        let write = effects("(module (global $g i32) (func $f (global.set $g (i32.const 1))))");
        assert!(trap.invalidates(&write));
    }
}
