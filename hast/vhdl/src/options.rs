//! Options controlling how the object model is rendered.
use hast_utils::HardwareGenerationConfig;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};

/// Number of hex digits of the hash kept in a shortened name.
const HASH_DIGITS: usize = 10;

#[derive(Default)]
struct ShortenerState {
    /// Logical name to emitted name.
    emitted: HashMap<String, String>,
    taken: HashSet<String>,
}

/// Shortens identifiers exceeding the length limit of synthesis tools.
///
/// A shortened name keeps the start of the original name followed by a hash
/// of the full name, and a counter if that is still taken. The same logical
/// name is always shortened the same way and two logical names never end up
/// with the same identifier.
pub struct NameShortener {
    /// Maximal length of the identifier, including the two backslashes of
    /// the extended identifier syntax.
    max_length: Option<usize>,
    state: Mutex<ShortenerState>,
}

impl NameShortener {
    pub fn new(max_length: Option<usize>) -> Self {
        NameShortener {
            max_length,
            state: Mutex::new(ShortenerState::default()),
        }
    }

    /// Names are emitted unchanged.
    pub fn disabled() -> Self {
        Self::new(None)
    }

    fn hashed(&self, name: &str, limit: usize, counter: usize) -> String {
        let digest = Sha256::digest(name.as_bytes());
        let hash: String = digest
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<String>()
            .chars()
            .take(HASH_DIGITS)
            .collect();
        let suffix = if counter == 0 {
            format!("_{hash}")
        } else {
            format!("_{hash}_{counter}")
        };
        let keep = limit.saturating_sub(suffix.len());
        let prefix: String = name.chars().take(keep).collect();
        prefix + &suffix
    }

    /// The identifier emitted for `name`, without escaping.
    pub fn shorten(&self, name: &str) -> String {
        let mut state = self.state.lock();
        if let Some(short) = state.emitted.get(name) {
            return short.clone();
        }
        let limit = self.max_length.map(|l| l.saturating_sub(2));
        let fits = limit.map_or(true, |l| name.chars().count() <= l);
        let result = if fits && !state.taken.contains(name) {
            name.to_string()
        } else {
            let limit = limit.unwrap_or(usize::MAX);
            let mut counter = 0;
            loop {
                let candidate = self.hashed(name, limit, counter);
                if !state.taken.contains(&candidate) {
                    break candidate;
                }
                counter += 1;
            }
        };
        if result != name {
            log::debug!("Shortened `{name}' to `{result}'");
        }
        state.taken.insert(result.clone());
        state.emitted.insert(name.to_string(), result.clone());
        result
    }
}

/// Wrap `name` into a VHDL extended identifier.
pub fn extended_identifier(name: &str) -> String {
    format!("\\{}\\", name.replace('\\', "\\\\"))
}

/// Options of one rendering run. The name shortener lives here, so every
/// node rendered with the same options agrees on shortened names.
pub struct VhdlGenerationOptions {
    /// Indent nested constructs and separate declarations with blank lines.
    pub format_code: bool,
    /// Leave out comments, except [crate::Comment::UnOmittableBlock].
    pub omit_comments: bool,
    pub shortener: NameShortener,
}

impl Default for VhdlGenerationOptions {
    fn default() -> Self {
        VhdlGenerationOptions {
            format_code: true,
            omit_comments: false,
            shortener: NameShortener::disabled(),
        }
    }
}

impl VhdlGenerationOptions {
    pub fn from_config(config: &HardwareGenerationConfig) -> Self {
        VhdlGenerationOptions {
            format_code: config.format_vhdl,
            omit_comments: config.omit_vhdl_comments,
            shortener: NameShortener::new(config.vhdl_max_identifier_length),
        }
    }

    /// The escaped, possibly shortened identifier for `name`.
    pub fn identifier(&self, name: &str) -> String {
        extended_identifier(&self.shortener.shorten(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn short_names_are_kept() {
        let shortener = NameShortener::new(Some(32));
        assert_eq!(shortener.shorten("Run.0.State"), "Run.0.State");
        assert_eq!(extended_identifier("a\\b"), "\\a\\\\b\\");
    }

    #[test]
    fn long_names_are_stable() {
        let shortener = NameShortener::new(Some(24));
        let long = "Samples.Fibonacci::Compute(System.UInt32).0.State";
        let first = shortener.shorten(long);
        assert!(first.len() <= 22);
        assert!(first.starts_with("Samples."));
        assert_eq!(shortener.shorten(long), first);
    }

    proptest! {
        #[test]
        fn distinct_names_never_collide(
            names in prop::collection::hash_set("[a-c.]{1,40}", 1..40)
        ) {
            let shortener = NameShortener::new(Some(18));
            let emitted: HashSet<String> =
                names.iter().map(|n| shortener.shorten(n)).collect();
            prop_assert_eq!(emitted.len(), names.len());
            prop_assert!(emitted.iter().all(|n| n.chars().count() <= 16));
        }
    }
}
