//! Optimization passes
//!
//! A [`Pass`] rewrites one function at a time and reports whether it changed
//! anything. [`PassRunner`] applies its passes to every function of a module,
//! repeating until nothing changes or the iteration cap is hit.

pub mod merge_blocks;

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::config::{Config, PassOptions};
use crate::ir::{Function, Module};

pub use merge_blocks::MergeBlocks;

/// Optimization pass trait
pub trait Pass {
    /// Name of the pass, as it appears in statistics
    fn name(&self) -> &'static str;

    /// Run the pass on a function.
    /// Returns true if any changes were made
    fn run_on_function(&self, func: &mut Function, options: &PassOptions) -> bool;
}

/// Runs a sequence of passes to a fixed point
pub struct PassRunner {
    passes: Vec<Box<dyn Pass>>,
    options: PassOptions,
    max_iterations: usize,
}

impl PassRunner {
    /// Runner with no passes
    pub fn new(options: PassOptions) -> Self {
        Self {
            passes: Vec::new(),
            options,
            max_iterations: 10,
        }
    }

    /// Default pass list with the options and cap taken from `config`
    pub fn from_config(config: &Config) -> Self {
        let mut runner = Self::new(config.options.clone());
        runner.set_max_iterations(config.max_iterations);
        runner.add_pass(Box::new(MergeBlocks));
        runner
    }

    pub fn add_pass(&mut self, pass: Box<dyn Pass>) {
        self.passes.push(pass);
    }

    /// Set maximum iterations for fixed-point optimization
    pub fn set_max_iterations(&mut self, n: usize) {
        self.max_iterations = n.max(1);
    }

    pub fn options(&self) -> &PassOptions {
        &self.options
    }

    /// Run all passes over every function of `module`
    pub fn run(&self, module: &mut Module) -> OptimizationStats {
        let mut stats = OptimizationStats::new();
        for func in &mut module.functions {
            let func_stats = self.run_on_function(func);
            stats.merge(&func_stats);
        }
        stats
    }

    /// Run all passes on a single function until fixed point
    pub fn run_on_function(&self, func: &mut Function) -> OptimizationStats {
        let mut stats = OptimizationStats::new();
        let mut iteration = 0;

        loop {
            let mut changed = false;
            iteration += 1;

            for pass in &self.passes {
                if pass.run_on_function(func, &self.options) {
                    changed = true;
                    stats.record_pass(pass.name());
                }
            }

            if !changed || iteration >= self.max_iterations {
                break;
            }
        }

        debug!(function = %func.name, iterations = iteration, "optimized function");
        stats.iterations = iteration;
        stats
    }
}

impl Default for PassRunner {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Statistics from a runner invocation
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct OptimizationStats {
    /// Iterations run, summed over functions
    pub iterations: usize,
    /// How many iterations each pass reported a change in
    pub pass_counts: BTreeMap<String, usize>,
}

impl OptimizationStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_pass(&mut self, name: &str) {
        *self.pass_counts.entry(name.to_string()).or_insert(0) += 1;
    }

    pub fn merge(&mut self, other: &OptimizationStats) {
        self.iterations += other.iterations;
        for (name, count) in &other.pass_counts {
            *self.pass_counts.entry(name.clone()).or_insert(0) += count;
        }
    }

    pub fn changed(&self) -> bool {
        !self.pass_counts.is_empty()
    }
}
