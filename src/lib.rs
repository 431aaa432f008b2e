//! # Hast
//!
//! Compiles the members of an object-oriented program model into a
//! synthesizable VHDL design: one state machine per hardware instance of
//! every member reachable from the hardware entry members.
//!
//! This crate plumbs the compiler crates together. A [Transformer] merges the
//! [ProgramImage]s handed over by a front end, runs the optimization steps of
//! [hast_opt], generates the hardware with [hast_transform] and renders it
//! with [hast_vhdl]. Results are cached by their [TransformationIdentity].
//!
//! ```rust
//! use hast::{ProgramImage, Transformer};
//! use hast_ast::Program;
//! use hast_utils::{HardwareGenerationConfig, HastResult};
//! fn main() -> HastResult<()> {
//!     let transformer = Transformer::new(HardwareGenerationConfig::default());
//!     let description =
//!         transformer.transform(&[ProgramImage::new("empty", Program::default())])?;
//!     assert!(description.vhdl().contains("Hast_IP"));
//!     Ok(())
//! }
//! ```
pub mod cache;
mod description;
mod identity;
mod transformer;

pub use cache::{DirectoryCache, MemoryCache, TransformationCache};
pub use description::HardwareDescription;
pub use identity::TransformationIdentity;
pub use transformer::{ProgramImage, Transformer};
