//! Shared utilities for the Hast compiler.
mod config;
mod errors;
mod id;
mod namegenerator;
mod warning;

pub use config::{
    DeviceManifest, HardwareGenerationConfig,
    MemberInvocationInstanceCountConfiguration, OperationDelays, TimedOperation,
};
pub use errors::{Error, HastResult};
pub use id::{FullName, GetName, HolderName, Id};
pub use namegenerator::NameGenerator;
pub use warning::{Warning, WarningCode};
