//! The conversion context. This is the top-level object the conversion steps
//! work on and contains everything needed to transform a program.
use crate::analysis::ConstantValuesTable;
use hast_ast::{LookupTables, Program};
use hast_utils::{FullName, HardwareGenerationConfig, Warning};
use std::collections::{BTreeMap, HashSet};

/// A program together with what the steps learned about it.
pub struct Context {
    /// The merged program. Steps rewrite member bodies in place.
    pub program: Program,
    pub config: HardwareGenerationConfig,
    /// Indices over `program`. Rebuilt when declarations change.
    pub lookup: LookupTables,
    /// Facts found by the last constant substitution.
    pub constant_values: ConstantValuesTable,
    /// Sizes of array holders.
    pub array_lengths: BTreeMap<FullName, u32>,
    /// Expressions replaced by literals so far.
    pub substitution_count: usize,
    warnings: Vec<Warning>,
    seen_warnings: HashSet<Warning>,
}

impl Context {
    pub fn new(program: Program, config: HardwareGenerationConfig) -> Self {
        let lookup = LookupTables::build(&program);
        Context {
            program,
            config,
            lookup,
            constant_values: ConstantValuesTable::default(),
            array_lengths: BTreeMap::new(),
            substitution_count: 0,
            warnings: vec![],
            seen_warnings: HashSet::new(),
        }
    }

    pub fn rebuild_lookup(&mut self) {
        self.lookup = LookupTables::build(&self.program);
    }

    /// Attach a warning. Warnings equal to one already attached are dropped.
    pub fn add_warning(&mut self, warning: Warning) {
        if self.seen_warnings.insert(warning.clone()) {
            log::warn!("{warning}");
            self.warnings.push(warning);
        }
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn take_warnings(&mut self) -> Vec<Warning> {
        self.seen_warnings.clear();
        std::mem::take(&mut self.warnings)
    }
}
