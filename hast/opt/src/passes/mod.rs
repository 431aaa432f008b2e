//! Conversion steps run on the program model before hardware is built.
mod array_length_resolution;
mod constant_substitution;
mod method_inliner;
mod unused_declaration_removal;
mod well_formed;

pub use array_length_resolution::ArrayLengthResolution;
pub use constant_substitution::ConstantSubstitution;
pub use method_inliner::MethodInliner;
pub use unused_declaration_removal::UnusedDeclarationRemoval;
pub use well_formed::WellFormed;
