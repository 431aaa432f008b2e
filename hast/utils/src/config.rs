//! Configuration of the hardware generation.
use crate::{Error, FullName, HastResult};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Upper bound of the number of hardware instances of one member.
pub const MAX_INSTANCE_COUNT: u32 = 1 << 16;

/// Bounds the number of hardware instances generated for the members whose
/// full name starts with `member_name_prefix`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MemberInvocationInstanceCountConfiguration {
    pub member_name_prefix: String,
    /// How deep a member may recursively call itself.
    pub max_recursion_depth: u32,
    /// How many invocations of the member may run at the same time.
    pub max_degree_of_parallelism: u32,
}

impl Default for MemberInvocationInstanceCountConfiguration {
    fn default() -> Self {
        Self {
            member_name_prefix: String::new(),
            max_recursion_depth: 0,
            max_degree_of_parallelism: 1,
        }
    }
}

impl MemberInvocationInstanceCountConfiguration {
    pub fn new<S: ToString>(
        member_name_prefix: S,
        max_recursion_depth: u32,
        max_degree_of_parallelism: u32,
    ) -> Self {
        Self {
            member_name_prefix: member_name_prefix.to_string(),
            max_recursion_depth,
            max_degree_of_parallelism,
        }
    }

    /// Total number of hardware instances of a matching member.
    pub fn instance_count(&self) -> HastResult<u32> {
        self.max_recursion_depth
            .checked_add(1)
            .and_then(|depths| depths.checked_mul(self.max_degree_of_parallelism))
            .filter(|count| *count <= MAX_INSTANCE_COUNT)
            .ok_or_else(|| {
                Error::configuration(format!(
                    "Members starting with `{}' would need more than {MAX_INSTANCE_COUNT} instances.",
                    self.member_name_prefix
                ))
            })
    }

    /// Index of the instance serving the given parallel lane and recursion
    /// depth.
    pub fn instance_index(&self, lane: u32, depth: u32) -> u32 {
        lane * (self.max_recursion_depth + 1) + depth
    }

    fn validate(&self) -> HastResult<()> {
        if self.max_degree_of_parallelism < 1 {
            return Err(Error::configuration(format!(
                "The degree of parallelism for members starting with `{}' must be at least 1.",
                self.member_name_prefix
            )));
        }
        self.instance_count()?;
        Ok(())
    }
}

/// Everything that influences how a program is turned into hardware.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareGenerationConfig {
    /// Name of the target device. Must have a [DeviceManifest].
    pub device_name: String,
    pub invocation_instance_counts:
        Vec<MemberInvocationInstanceCountConfiguration>,
    pub enable_constant_substitution: bool,
    /// Add memory ports to every component and lower memory accesses.
    pub use_simple_memory: bool,
    pub enable_method_inlining: bool,
    /// Members to inline in addition to the ones marked inlinable.
    pub additional_inlinable_members: Vec<FullName>,
    /// Lengths of arrays that can't be determined statically, keyed by the
    /// holder of the array.
    pub array_lengths: BTreeMap<FullName, u32>,
    pub enable_caching: bool,
    /// Longer identifiers are shortened when rendering. `None` disables
    /// shortening.
    pub vhdl_max_identifier_length: Option<usize>,
    pub format_vhdl: bool,
    pub omit_vhdl_comments: bool,
}

impl Default for HardwareGenerationConfig {
    fn default() -> Self {
        Self {
            device_name: DeviceManifest::NEXYS_A7.to_string(),
            invocation_instance_counts: vec![],
            enable_constant_substitution: true,
            use_simple_memory: true,
            enable_method_inlining: true,
            additional_inlinable_members: vec![],
            array_lengths: BTreeMap::new(),
            enable_caching: true,
            vhdl_max_identifier_length: Some(200),
            format_vhdl: true,
            omit_vhdl_comments: false,
        }
    }
}

impl HardwareGenerationConfig {
    pub fn for_device<S: ToString>(device_name: S) -> Self {
        Self {
            device_name: device_name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_instance_count(
        mut self,
        entry: MemberInvocationInstanceCountConfiguration,
    ) -> Self {
        self.invocation_instance_counts.push(entry);
        self
    }

    /// Check the configuration for errors that make hardware generation
    /// impossible.
    pub fn validate(&self) -> HastResult<()> {
        if self.device_name.is_empty() {
            return Err(Error::configuration("No device name given."));
        }
        for entry in &self.invocation_instance_counts {
            entry.validate()?;
        }
        if let Some(dup) = self
            .invocation_instance_counts
            .iter()
            .map(|e| e.member_name_prefix.as_str())
            .duplicates()
            .next()
        {
            return Err(Error::configuration(format!(
                "The member name prefix `{dup}' is configured more than once."
            )));
        }
        if let Some((holder, _)) =
            self.array_lengths.iter().find(|(_, len)| **len == 0)
        {
            return Err(Error::configuration(format!(
                "The array length override for `{holder}' must be positive."
            )));
        }
        if self.vhdl_max_identifier_length.is_some_and(|len| len < 16) {
            return Err(Error::configuration(
                "The maximal identifier length must be at least 16.",
            ));
        }
        Ok(())
    }

    /// Instance count configuration of a member: the entry with the longest
    /// prefix matching the member's full name, or the default one.
    pub fn resolve_instance_count(
        &self,
        member: &FullName,
    ) -> MemberInvocationInstanceCountConfiguration {
        self.invocation_instance_counts
            .iter()
            .filter(|entry| member.starts_with(&entry.member_name_prefix))
            .max_by_key(|entry| entry.member_name_prefix.len())
            .cloned()
            .unwrap_or_default()
    }

    /// A copy with every collection sorted. Two configurations that only
    /// differ in the order of their entries have the same canonical form.
    pub fn canonical(&self) -> Self {
        let mut canonical = self.clone();
        canonical.invocation_instance_counts.sort();
        canonical.invocation_instance_counts.dedup();
        canonical.additional_inlinable_members.sort();
        canonical.additional_inlinable_members.dedup();
        canonical
    }
}

/// Operations whose latency depends on the width of their operands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimedOperation {
    Multiplication,
    Division,
    Remainder,
    SquareRoot,
}

/// Propagation delay of an operation per bit of operand width, in
/// nanoseconds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OperationDelays {
    pub multiplication_ns_per_bit: f64,
    pub division_ns_per_bit: f64,
    pub square_root_ns_per_bit: f64,
}

impl Default for OperationDelays {
    fn default() -> Self {
        Self {
            multiplication_ns_per_bit: 0.4,
            division_ns_per_bit: 1.0,
            square_root_ns_per_bit: 1.5,
        }
    }
}

/// Timing characteristics of a target device.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeviceManifest {
    pub name: String,
    pub clock_frequency_hz: u64,
    pub delays: OperationDelays,
}

impl DeviceManifest {
    pub const NEXYS_A7: &'static str = "Nexys A7";
    pub const TE0715: &'static str = "TE0715-04-30-1C";
    pub const ALVEO_U250: &'static str = "Alveo U250";

    /// Manifests of the devices known to the compiler.
    pub fn builtin() -> Vec<DeviceManifest> {
        vec![
            DeviceManifest {
                name: Self::NEXYS_A7.to_string(),
                clock_frequency_hz: 100_000_000,
                delays: OperationDelays::default(),
            },
            DeviceManifest {
                name: Self::TE0715.to_string(),
                clock_frequency_hz: 150_000_000,
                delays: OperationDelays::default(),
            },
            DeviceManifest {
                name: Self::ALVEO_U250.to_string(),
                clock_frequency_hz: 300_000_000,
                delays: OperationDelays {
                    multiplication_ns_per_bit: 0.2,
                    division_ns_per_bit: 0.6,
                    square_root_ns_per_bit: 0.9,
                },
            },
        ]
    }

    pub fn by_name(name: &str) -> HastResult<DeviceManifest> {
        let manifest = Self::builtin()
            .into_iter()
            .find(|m| m.name == name)
            .ok_or_else(|| {
                Error::configuration(format!(
                    "No manifest for the device `{name}'. Known devices: {}.",
                    Self::builtin().iter().map(|m| &m.name).join(", ")
                ))
            })?;
        log::debug!(
            "Generating for `{}' at {} Hz.",
            manifest.name,
            manifest.clock_frequency_hz
        );
        Ok(manifest)
    }

    pub fn clock_period_ns(&self) -> f64 {
        1e9 / self.clock_frequency_hz as f64
    }

    /// Worst-case number of clock cycles the operation needs on operands of
    /// `width` bits. Always at least 1.
    pub fn required_cycles(&self, op: TimedOperation, width: u32) -> u32 {
        let per_bit = match op {
            TimedOperation::Multiplication => {
                self.delays.multiplication_ns_per_bit
            }
            TimedOperation::Division | TimedOperation::Remainder => {
                self.delays.division_ns_per_bit
            }
            TimedOperation::SquareRoot => self.delays.square_root_ns_per_bit,
        };
        let delay = per_bit * width as f64;
        let cycles = (delay / self.clock_period_ns()).ceil() as u32;
        cycles.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_count_arithmetic() {
        let entry = MemberInvocationInstanceCountConfiguration::new("A", 2, 3);
        assert_eq!(entry.instance_count().unwrap(), 9);
        assert_eq!(entry.instance_index(2, 1), 7);
    }

    #[test]
    fn zero_parallelism_is_rejected() {
        let config = HardwareGenerationConfig::default().with_instance_count(
            MemberInvocationInstanceCountConfiguration::new("A", 0, 0),
        );
        let err = config.validate().unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn oversized_instance_counts_are_rejected() {
        for (depth, parallelism) in [(u32::MAX, 2), (1 << 20, 1), (2, u32::MAX)] {
            let entry = MemberInvocationInstanceCountConfiguration::new(
                "A",
                depth,
                parallelism,
            );
            assert!(entry.instance_count().unwrap_err().is_configuration_error());
            let config =
                HardwareGenerationConfig::default().with_instance_count(entry);
            assert!(config.validate().unwrap_err().is_configuration_error());
        }
    }

    #[test]
    fn longest_prefix_wins() {
        let config = HardwareGenerationConfig::default()
            .with_instance_count(
                MemberInvocationInstanceCountConfiguration::new("Samples", 0, 2),
            )
            .with_instance_count(
                MemberInvocationInstanceCountConfiguration::new(
                    "Samples.Fib::", 3, 1,
                ),
            );
        let fib = FullName::new("Samples.Fib::Compute(System.UInt32)");
        assert_eq!(config.resolve_instance_count(&fib).max_recursion_depth, 3);
        let other = FullName::new("Samples.Prime::IsPrime(System.UInt32)");
        assert_eq!(
            config
                .resolve_instance_count(&other)
                .max_degree_of_parallelism,
            2
        );
        let unrelated = FullName::new("Other::M()");
        assert_eq!(
            config
                .resolve_instance_count(&unrelated)
                .instance_count()
                .unwrap(),
            1
        );
    }

    #[test]
    fn canonical_form_ignores_order() {
        let a = MemberInvocationInstanceCountConfiguration::new("A", 1, 1);
        let b = MemberInvocationInstanceCountConfiguration::new("B", 1, 2);
        let first = HardwareGenerationConfig::default()
            .with_instance_count(a.clone())
            .with_instance_count(b.clone());
        let second = HardwareGenerationConfig::default()
            .with_instance_count(b)
            .with_instance_count(a);
        assert_ne!(first, second);
        assert_eq!(first.canonical(), second.canonical());
    }

    #[test]
    fn multi_cycle_latency() {
        let _ = env_logger::builder().is_test(true).try_init();
        let device = DeviceManifest::by_name(DeviceManifest::NEXYS_A7).unwrap();
        // 32 * 0.4ns = 12.8ns at a 10ns clock.
        assert_eq!(device.required_cycles(TimedOperation::Multiplication, 32), 2);
        assert_eq!(device.required_cycles(TimedOperation::Division, 32), 4);
        assert_eq!(device.required_cycles(TimedOperation::Multiplication, 8), 1);
        assert!(DeviceManifest::by_name("Unknown board").is_err());
    }
}
