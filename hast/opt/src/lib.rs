//! # Optimization of the program model
//!
//! The steps in this crate rewrite member bodies of a [hast_ast::Program]
//! until they are ready to be turned into hardware: they check that the
//! program is well-formed, inline small members, substitute constants and
//! fold the operators using them, remove unused locals and determine the
//! length of every array.
//!
//! Steps are registered in a [PassManager], which runs them in dependency
//! order on a [Context].
//!
//! ```rust
//! use hast_opt::{Context, PassManager};
//! use hast_ast::Program;
//! use hast_utils::{HardwareGenerationConfig, HastResult};
//! fn main() -> HastResult<()> {
//!     let mut ctx = Context::new(Program::default(), HardwareGenerationConfig::default());
//!     PassManager::default_passes()?.execute(&mut ctx)?;
//!     assert!(ctx.warnings().is_empty());
//!     Ok(())
//! }
//! ```
pub mod analysis;
mod context;
pub mod default_passes;
pub mod eval;
pub mod pass_manager;
pub mod passes;
pub mod traversal;

#[cfg(test)]
mod testing;

pub use context::Context;
pub use pass_manager::PassManager;
