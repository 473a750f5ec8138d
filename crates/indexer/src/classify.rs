//! Byte-signature content classification.
//!
//! Files are recognized by their leading bytes against a small ordered
//! signature table; the first matching entry wins. Files that match no
//! signature are not indexed at all.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use crate::record::TypeTag;

/// A leading-byte signature mapped to a type tag.
#[derive(Debug, Clone, Copy)]
pub struct Signature {
    pub tag: TypeTag,
    pub prefix: &'static [u8],
}

/// Recognized signatures, checked in order.
pub const SIGNATURES: &[Signature] = &[
    Signature {
        tag: TypeTag::Jpeg,
        prefix: &[0xff, 0xd8, 0xff],
    },
    Signature {
        tag: TypeTag::Png,
        prefix: &[0x89, 0x50, 0x4e],
    },
    Signature {
        tag: TypeTag::Zip,
        prefix: &[0x50, 0x4b],
    },
    Signature {
        tag: TypeTag::Gzip,
        prefix: &[0x1f, 0x8b],
    },
];

/// Longest prefix any signature inspects.
const HEAD_LEN: usize = 3;

/// Matches leading bytes against the signature table.
pub fn classify_bytes(head: &[u8]) -> Option<TypeTag> {
    SIGNATURES
        .iter()
        .find(|signature| head.len() >= signature.prefix.len() && head.starts_with(signature.prefix))
        .map(|signature| signature.tag)
}

/// Reads the leading bytes of `path` and classifies them.
///
/// Returns `Ok(None)` for unrecognized content; IO failures bubble up so
/// the walker can log and skip the file.
pub fn classify_file(path: &Path) -> io::Result<Option<TypeTag>> {
    let mut file = File::open(path)?;
    let mut head = [0u8; HEAD_LEN];
    let mut filled = 0;
    while filled < HEAD_LEN {
        match file.read(&mut head[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(classify_bytes(&head[..filled]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn recognizes_each_signature() {
        assert_eq!(classify_bytes(&[0xff, 0xd8, 0xff]), Some(TypeTag::Jpeg));
        assert_eq!(classify_bytes(&[0x89, 0x50, 0x4e]), Some(TypeTag::Png));
        assert_eq!(classify_bytes(&[0x50, 0x4b, 0x03]), Some(TypeTag::Zip));
        assert_eq!(classify_bytes(&[0x1f, 0x8b, 0x08]), Some(TypeTag::Gzip));
    }

    #[test]
    fn rejects_unknown_and_short_heads() {
        assert_eq!(classify_bytes(b"abc"), None);
        assert_eq!(classify_bytes(&[0xff, 0xd8]), None); // jpeg needs 3 bytes
        assert_eq!(classify_bytes(&[]), None);
    }

    #[test]
    fn classifies_file_contents() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("shot.png");
        let mut file = File::create(&path).unwrap();
        file.write_all(&[0x89, 0x50, 0x4e, 0x47]).unwrap();

        assert_eq!(classify_file(&path).unwrap(), Some(TypeTag::Png));
    }

    #[test]
    fn empty_file_is_unclassified() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("empty");
        File::create(&path).unwrap();

        assert_eq!(classify_file(&path).unwrap(), None);
    }
}
