//! Query predicates evaluated over the populated slots.

use memchr::memmem;

use crate::record::{IndexedRecord, TypeTag};

/// A single-command filter over indexed records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// `largerthan <N>`: size strictly greater than N.
    LargerThan(i64),
    /// `namepart <S>`: case-sensitive substring of the name.
    NamePart(String),
    /// `owner <UID>`: exact owner match.
    Owner(u32),
}

impl Predicate {
    pub fn matches(&self, record: &IndexedRecord) -> bool {
        match self {
            Self::LargerThan(threshold) => record.size > *threshold,
            Self::NamePart(needle) => {
                memmem::find(record.name.as_bytes(), needle.as_bytes()).is_some()
            }
            Self::Owner(uid) => record.owner == *uid,
        }
    }
}

/// Per-tag record tally for the `count` command.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TypeCounts {
    pub jpeg: usize,
    pub png: usize,
    pub zip: usize,
    pub gzip: usize,
    /// Directories, and any record whose tag is not a known file type.
    pub folder: usize,
}

impl TypeCounts {
    pub fn tally(records: impl Iterator<Item = IndexedRecord>) -> Self {
        let mut counts = Self::default();
        for record in records {
            match record.tag {
                TypeTag::Jpeg => counts.jpeg += 1,
                TypeTag::Png => counts.png += 1,
                TypeTag::Zip => counts.zip += 1,
                TypeTag::Gzip => counts.gzip += 1,
                TypeTag::Directory => counts.folder += 1,
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, size: i64, owner: u32, tag: TypeTag) -> IndexedRecord {
        IndexedRecord::new(name, &format!("/t/{name}"), size, owner, tag)
    }

    fn fixtures() -> Vec<IndexedRecord> {
        vec![
            record("d", 64, 1000, TypeTag::Directory),
            record("a.jpg", 100, 1000, TypeTag::Jpeg),
            record("b.jpg", 200, 1001, TypeTag::Jpeg),
            record("c.png", 50, 1000, TypeTag::Png),
        ]
    }

    #[test]
    fn largerthan_is_strict() {
        let pred = Predicate::LargerThan(150);
        let matched: Vec<_> = fixtures().into_iter().filter(|r| pred.matches(r)).collect();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].name, "b.jpg");

        assert!(!Predicate::LargerThan(200).matches(&record("b.jpg", 200, 0, TypeTag::Jpeg)));
    }

    #[test]
    fn namepart_is_case_sensitive_substring() {
        let pred = Predicate::NamePart(".jpg".to_string());
        assert_eq!(fixtures().iter().filter(|r| pred.matches(r)).count(), 2);

        assert!(!Predicate::NamePart(".JPG".to_string())
            .matches(&record("a.jpg", 1, 0, TypeTag::Jpeg)));
        assert!(Predicate::NamePart(String::new()).matches(&record("a", 1, 0, TypeTag::Jpeg)));
    }

    #[test]
    fn owner_matches_exactly() {
        let pred = Predicate::Owner(1000);
        assert_eq!(fixtures().iter().filter(|r| pred.matches(r)).count(), 3);
        assert_eq!(
            fixtures()
                .iter()
                .filter(|r| Predicate::Owner(42).matches(r))
                .count(),
            0
        );
    }

    #[test]
    fn counts_bucket_by_tag() {
        let counts = TypeCounts::tally(fixtures().into_iter());
        assert_eq!(
            counts,
            TypeCounts {
                jpeg: 2,
                png: 1,
                zip: 0,
                gzip: 0,
                folder: 1,
            }
        );
    }
}
