//! Defines the default steps available to [PassManager].
use crate::pass_manager::PassManager;
use crate::passes::{
    ArrayLengthResolution, ConstantSubstitution, MethodInliner,
    UnusedDeclarationRemoval, WellFormed,
};
use hast_utils::HastResult;

impl PassManager {
    pub fn default_passes() -> HastResult<Self> {
        let mut pm = PassManager::default();

        // Validation
        pm.register_step::<WellFormed>()?;

        // Optimization
        pm.register_step::<MethodInliner>()?;
        pm.register_step_with::<ConstantSubstitution>(Box::new(|ctx| {
            ConstantSubstitution::substitute(ctx, false)?;
            Ok(())
        }))?;
        pm.register_step::<UnusedDeclarationRemoval>()?;

        // Preparation for hardware generation
        pm.register_step::<ArrayLengthResolution>()?;

        Ok(pm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_plan() {
        let pm = PassManager::default_passes().unwrap();
        assert_eq!(
            pm.plan().unwrap(),
            vec![
                "well-formed",
                "method-inliner",
                "constant-substitution",
                "array-length-resolution",
                "unused-declaration-removal",
            ]
        );
    }
}
