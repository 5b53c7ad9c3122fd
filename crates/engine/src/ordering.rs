use std::cmp::Ordering;

use model::{Candidate, ContentHash, Version};

/// What the duplicate sorter needs to know about a candidate.
pub trait SortableCandidate {
    fn id(&self) -> &str;
    fn version(&self) -> &Version;
    /// Name recorded in the disabled-files registry.
    fn filename(&self) -> String;
    fn sort_order(&self) -> i32;
    fn nest_level(&self) -> u32;
    fn content_hash(&self) -> Option<&ContentHash>;
}

impl SortableCandidate for Candidate {
    fn id(&self) -> &str {
        &self.id
    }

    fn version(&self) -> &Version {
        &self.version
    }

    fn filename(&self) -> String {
        Candidate::filename(self)
    }

    fn sort_order(&self) -> i32 {
        self.sort_order
    }

    fn nest_level(&self) -> u32 {
        Candidate::nest_level(self)
    }

    fn content_hash(&self) -> Option<&ContentHash> {
        self.content_hash.as_ref()
    }
}

/// Order in which duplicates are visited, and in which survivors come out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderingPolicy {
    /// Sort order, then file name, then version, then nest level. Matches
    /// the order early plugins are activated in.
    Bootstrap,
    /// Case-insensitive identifier, then version, then nest level.
    Full,
}

impl OrderingPolicy {
    pub fn compare<T: SortableCandidate>(&self, a: &T, b: &T) -> Ordering {
        match self {
            OrderingPolicy::Bootstrap => a
                .sort_order()
                .cmp(&b.sort_order())
                .then_with(|| a.filename().cmp(&b.filename()))
                .then_with(|| a.version().cmp(b.version()))
                .then_with(|| a.nest_level().cmp(&b.nest_level())),
            OrderingPolicy::Full => a
                .id()
                .to_lowercase()
                .cmp(&b.id().to_lowercase())
                .then_with(|| a.version().cmp(b.version()))
                .then_with(|| a.nest_level().cmp(&b.nest_level())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn cand(file: &str, sort_order: i32, version: (u64, u64, u64)) -> Candidate {
        let mut c = Candidate::new(PathBuf::from(file));
        c.sort_order = sort_order;
        c.version = Version::new(version.0, version.1, version.2);
        c
    }

    #[test]
    fn bootstrap_orders_by_sort_order_first() {
        let mut list = vec![
            cand("b.jar", 0, (1, 0, 0)),
            cand("a.jar", 10, (1, 0, 0)),
            cand("c.jar", -5, (1, 0, 0)),
        ];
        list.sort_by(|x, y| OrderingPolicy::Bootstrap.compare(x, y));
        let names: Vec<_> = list.iter().map(|c| c.filename()).collect();
        assert_eq!(names, vec!["c.jar", "b.jar", "a.jar"]);
    }

    #[test]
    fn full_orders_by_id_then_version() {
        let mut a = cand("x.jar", 0, (2, 0, 0));
        a.id = "Foo".into();
        let mut b = cand("y.jar", 0, (1, 0, 0));
        b.id = "foo".into();
        let mut c = cand("z.jar", 0, (9, 0, 0));
        c.id = "bar".into();
        let mut list = vec![a, b, c];
        list.sort_by(|x, y| OrderingPolicy::Full.compare(x, y));
        let files: Vec<_> = list.iter().map(|c| c.filename()).collect();
        assert_eq!(files, vec!["z.jar", "y.jar", "x.jar"]);
    }
}
