//! Define the PassManager structure that is used to register conversion steps
//! and run them in dependency order.
use crate::passes::ConstantSubstitution;
use crate::traversal::{self, Resubstitution};
use crate::Context;
use hast_utils::{Error, HastResult};
use petgraph::graphmap::DiGraphMap;
use petgraph::Direction;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::time::Instant;

/// Top-level type for all steps that transform a [Context]
pub type StepClosure = Box<dyn Fn(&mut Context) -> HastResult<()>>;

struct Step {
    closure: StepClosure,
    description: &'static str,
    dependencies: &'static [&'static str],
    resubstitution: Resubstitution,
}

/// Structure that tracks all registered conversion steps.
#[derive(Default)]
pub struct PassManager {
    steps: BTreeMap<&'static str, Step>,
}

impl PassManager {
    /// Register a new step and return an error if another step with the
    /// same name has already been registered.
    ///
    /// ## Example
    /// ```rust
    /// use hast_opt::{passes::WellFormed, PassManager};
    /// let mut pm = PassManager::default();
    /// pm.register_step::<WellFormed>().unwrap();
    /// ```
    pub fn register_step<Pass>(&mut self) -> HastResult<()>
    where
        Pass:
            traversal::Visitor + traversal::ConstructVisitor + traversal::Named,
    {
        self.register_step_with::<Pass>(Box::new(|ctx| {
            Pass::do_pass_default(ctx)?;
            Ok(())
        }))
    }

    /// Register a step that is run through `closure` instead of
    /// [traversal::Visitor::do_pass_default]. Used by steps needing
    /// configuration only known at runtime.
    pub fn register_step_with<Pass>(
        &mut self,
        closure: StepClosure,
    ) -> HastResult<()>
    where
        Pass: traversal::Named,
    {
        let name = Pass::name();
        if self.steps.contains_key(name) {
            return Err(Error::misc(format!(
                "Step with name '{name}' is already registered."
            )));
        }
        self.steps.insert(
            name,
            Step {
                closure,
                description: Pass::description(),
                dependencies: Pass::dependencies(),
                resubstitution: Pass::resubstitution(),
            },
        );
        Ok(())
    }

    /// Return a string representation to show all registered steps.
    pub fn complete_help(&self) -> String {
        let mut ret = String::with_capacity(1000);
        ret.push_str("Steps:\n");
        for (name, step) in &self.steps {
            let _ = write!(ret, "- {name}: {}", step.description);
            if !step.dependencies.is_empty() {
                let _ = write!(ret, " (after {})", step.dependencies.join(", "));
            }
            ret.push('\n');
        }
        ret
    }

    /// The order the steps run in. A step always runs after its dependencies;
    /// steps that could run at the same point are ordered by name.
    pub fn plan(&self) -> HastResult<Vec<&'static str>> {
        let mut graph: DiGraphMap<&'static str, ()> = DiGraphMap::new();
        for (&name, step) in &self.steps {
            graph.add_node(name);
            for dep in step.dependencies {
                if !self.steps.contains_key(dep) {
                    return Err(Error::misc(format!(
                        "Step `{name}' depends on the unknown step `{dep}'."
                    )));
                }
                graph.add_edge(*dep, name, ());
            }
        }

        let mut in_degree: BTreeMap<&'static str, usize> = graph
            .nodes()
            .map(|n| (n, graph.neighbors_directed(n, Direction::Incoming).count()))
            .collect();
        let mut ready: BTreeSet<&'static str> = in_degree
            .iter()
            .filter(|(_, deg)| **deg == 0)
            .map(|(n, _)| *n)
            .collect();
        let mut order = Vec::with_capacity(self.steps.len());
        while let Some(next) = ready.pop_first() {
            order.push(next);
            for succ in graph.neighbors_directed(next, Direction::Outgoing) {
                if let Some(deg) = in_degree.get_mut(&succ) {
                    *deg -= 1;
                    if *deg == 0 {
                        ready.insert(succ);
                    }
                }
            }
        }

        if order.len() != self.steps.len() {
            let stuck = in_degree
                .iter()
                .filter(|(_, deg)| **deg > 0)
                .map(|(n, _)| *n)
                .collect::<Vec<_>>();
            return Err(Error::misc(format!(
                "The dependencies of the steps {} form a cycle.",
                stuck.join(", ")
            )));
        }
        Ok(order)
    }

    /// Run every registered step exactly once.
    pub fn execute(&self, ctx: &mut Context) -> HastResult<()> {
        for name in self.plan()? {
            let step = &self.steps[&name];
            let start = Instant::now();
            (step.closure)(ctx)?;
            let elapsed = start.elapsed();
            if elapsed.as_secs() > 5 {
                log::warn!("{name}: {}ms", elapsed.as_millis());
            } else {
                log::info!("{name}: {}ms", elapsed.as_millis());
            }

            if step.resubstitution != Resubstitution::None
                && ctx.config.enable_constant_substitution
            {
                ConstantSubstitution::substitute(
                    ctx,
                    step.resubstitution == Resubstitution::ReuseTable,
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traversal::{Named, Visitor};
    use hast_ast::Program;
    use hast_utils::HardwareGenerationConfig;
    use std::cell::RefCell;
    use std::rc::Rc;

    macro_rules! step {
        ($ty:ident, $name:literal, [$($dep:literal),*]) => {
            #[derive(Default)]
            struct $ty;
            impl Named for $ty {
                fn name() -> &'static str {
                    $name
                }
                fn description() -> &'static str {
                    "test step"
                }
                fn dependencies() -> &'static [&'static str] {
                    &[$($dep),*]
                }
            }
            impl Visitor for $ty {}
        };
    }

    step!(First, "b-first", []);
    step!(Second, "a-second", ["b-first"]);
    step!(Third, "c-third", ["b-first"]);
    step!(Loop, "loop", ["loop-back"]);
    step!(LoopBack, "loop-back", ["loop"]);
    step!(Dangling, "dangling", ["missing"]);

    #[test]
    fn runs_in_dependency_order() {
        let mut pm = PassManager::default();
        pm.register_step::<Third>().unwrap();
        pm.register_step::<Second>().unwrap();
        pm.register_step::<First>().unwrap();
        assert_eq!(pm.plan().unwrap(), vec!["b-first", "a-second", "c-third"]);
    }

    #[test]
    fn each_step_runs_once() {
        let runs = Rc::new(RefCell::new(vec![]));
        let mut pm = PassManager::default();
        let r = Rc::clone(&runs);
        pm.register_step_with::<First>(Box::new(move |_| {
            r.borrow_mut().push("b-first");
            Ok(())
        }))
        .unwrap();
        let r = Rc::clone(&runs);
        pm.register_step_with::<Second>(Box::new(move |_| {
            r.borrow_mut().push("a-second");
            Ok(())
        }))
        .unwrap();
        let mut ctx =
            Context::new(Program::default(), HardwareGenerationConfig::default());
        pm.execute(&mut ctx).unwrap();
        assert_eq!(*runs.borrow(), vec!["b-first", "a-second"]);
    }

    #[test]
    fn rejects_cycles_and_unknown_dependencies() {
        let mut pm = PassManager::default();
        pm.register_step::<Loop>().unwrap();
        pm.register_step::<LoopBack>().unwrap();
        assert!(pm.plan().is_err());

        let mut pm = PassManager::default();
        pm.register_step::<Dangling>().unwrap();
        assert!(pm.plan().is_err());
    }

    #[test]
    fn rejects_duplicate_names() {
        let mut pm = PassManager::default();
        pm.register_step::<First>().unwrap();
        assert!(pm.register_step::<First>().is_err());
    }
}
