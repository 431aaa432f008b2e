use crate::Id;
use std::collections::{HashMap, HashSet};

/// Hands out hardware object names that no earlier call, and no reserved
/// name, already took.
#[derive(Clone, Debug, Default)]
pub struct NameGenerator {
    next_suffix: HashMap<Id, u32>,
    taken: HashSet<Id>,
}

impl NameGenerator {
    /// A generator that never returns any of `names`.
    pub fn with_reserved<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Id>,
    {
        NameGenerator {
            next_suffix: HashMap::new(),
            taken: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Marks `name` as used. Returns false if it already was.
    pub fn reserve<S: Into<Id>>(&mut self, name: S) -> bool {
        self.taken.insert(name.into())
    }

    /// `prefix` itself while it is free, then `prefix.0`, `prefix.1` and
    /// so on.
    /// ```
    /// # use hast_utils::NameGenerator;
    /// let mut names = NameGenerator::default();
    /// assert_eq!(names.gen_name("temp").as_str(), "temp");
    /// assert_eq!(names.gen_name("temp").as_str(), "temp.0");
    /// ```
    pub fn gen_name<S: Into<Id>>(&mut self, prefix: S) -> Id {
        let prefix = prefix.into();
        if self.taken.insert(prefix) {
            return prefix;
        }
        let suffix = self.next_suffix.entry(prefix).or_default();
        loop {
            let name = Id::new(format!("{prefix}.{suffix}"));
            *suffix += 1;
            if self.taken.insert(name) {
                return name;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::NameGenerator;
    use crate::Id;

    #[test]
    fn reserved_names_are_skipped() {
        let mut names = NameGenerator::with_reserved(["x", "x.0"]);
        assert_eq!(names.gen_name("x"), Id::new("x.1"));
        assert_eq!(names.gen_name("x"), Id::new("x.2"));
        assert_eq!(names.gen_name("y"), Id::new("y"));
    }

    #[test]
    fn generated_names_count_as_taken() {
        let mut names = NameGenerator::default();
        let first = names.gen_name("s.divide");
        assert!(!names.reserve(first));
        assert!(names.reserve("s.multiply"));
        assert_eq!(names.gen_name("s.multiply").as_str(), "s.multiply.0");
    }
}
