use hast_utils::{FullName, HardwareGenerationConfig, HastResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Content hash of everything a transformation depends on. Equal identities
/// produce equal hardware descriptions, so the identity is the cache key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransformationIdentity(String);

impl TransformationIdentity {
    /// SHA-256 over the identities of the program images, the rendered
    /// program, the entry point ids and the canonical form of the
    /// configuration. Neither the order of the images nor the order of
    /// configuration entries matters.
    pub fn compute<'a, I>(
        image_identities: I,
        program_text: &str,
        entry_point_ids: &BTreeMap<FullName, u32>,
        config: &HardwareGenerationConfig,
    ) -> HastResult<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut images: Vec<&str> = image_identities.into_iter().collect();
        images.sort_unstable();
        images.dedup();

        let mut hasher = Sha256::new();
        hasher.update(env!("CARGO_PKG_VERSION").as_bytes());
        for image in images {
            hasher.update(b"\0image\0");
            hasher.update(image.as_bytes());
        }
        hasher.update(b"\0program\0");
        hasher.update(program_text.as_bytes());
        hasher.update(b"\0entry points\0");
        hasher.update(serde_json::to_vec(entry_point_ids)?);
        hasher.update(b"\0config\0");
        hasher.update(serde_json::to_vec(&config.canonical())?);
        let hex = hasher
            .finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<String>();
        Ok(TransformationIdentity(hex))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TransformationIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hast_utils::MemberInvocationInstanceCountConfiguration;

    #[test]
    fn identity_ignores_ordering() {
        let a = MemberInvocationInstanceCountConfiguration::new("A", 0, 2);
        let b = MemberInvocationInstanceCountConfiguration::new("B", 1, 1);
        let config_ab = HardwareGenerationConfig::default()
            .with_instance_count(a.clone())
            .with_instance_count(b.clone());
        let config_ba = HardwareGenerationConfig::default()
            .with_instance_count(b)
            .with_instance_count(a);
        let ids = BTreeMap::new();
        let first = TransformationIdentity::compute(["x", "y"], "", &ids, &config_ab).unwrap();
        let second = TransformationIdentity::compute(["y", "x"], "", &ids, &config_ba).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.as_str().len(), 64);
    }

    #[test]
    fn identity_depends_on_inputs() {
        let config = HardwareGenerationConfig::default();
        let ids = BTreeMap::new();
        let base = TransformationIdentity::compute(["x"], "", &ids, &config).unwrap();
        let other_image = TransformationIdentity::compute(["z"], "", &ids, &config).unwrap();
        let other_config = TransformationIdentity::compute(
            ["x"],
            "",
            &ids,
            &HardwareGenerationConfig {
                format_vhdl: false,
                ..Default::default()
            },
        )
        .unwrap();
        let with_ids = TransformationIdentity::compute(
            ["x"],
            "",
            &BTreeMap::from([(FullName::new("T::M()"), 3)]),
            &config,
        )
        .unwrap();
        let other_program =
            TransformationIdentity::compute(["x"], "class T { }", &ids, &config).unwrap();
        assert_ne!(base, other_image);
        assert_ne!(base, other_program);
        assert_ne!(base, other_config);
        assert_ne!(base, with_ids);
    }
}
