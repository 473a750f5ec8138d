//! Fixed-width record format.
//!
//! A database file is a flat array of 422-byte records. Each record encodes
//! name (101 bytes), path (301 bytes), size (i64 LE), owner (u32 LE) and an
//! 8-byte type tag; text fields are NUL-padded. Over-long names and paths
//! are truncated at a UTF-8 boundary with a warning.

use std::fmt;

/// Maximum content bytes for the name field (one byte of the 101-byte slot
/// stays NUL, matching the on-disk format).
pub const NAME_LIMIT: usize = 100;
/// Maximum content bytes for the path field.
pub const PATH_LIMIT: usize = 300;

const NAME_FIELD: usize = NAME_LIMIT + 1;
const PATH_FIELD: usize = PATH_LIMIT + 1;
const TAG_FIELD: usize = 8;

const NAME_OFFSET: usize = 0;
const PATH_OFFSET: usize = NAME_OFFSET + NAME_FIELD;
const SIZE_OFFSET: usize = PATH_OFFSET + PATH_FIELD;
const OWNER_OFFSET: usize = SIZE_OFFSET + 8;
const TAG_OFFSET: usize = OWNER_OFFSET + 4;

/// Width of one encoded record.
pub const RECORD_LEN: usize = TAG_OFFSET + TAG_FIELD;

/// Content-type tag of an indexed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    Jpeg,
    Png,
    Zip,
    Gzip,
    Directory,
}

impl TypeTag {
    /// The tag string stored on disk. Directories use `"0"`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Zip => "zip",
            Self::Gzip => "gzip",
            Self::Directory => "0",
        }
    }

    pub fn from_str(raw: &str) -> Option<Self> {
        match raw {
            "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "zip" => Some(Self::Zip),
            "gzip" => Some(Self::Gzip),
            "0" => Some(Self::Directory),
            _ => None,
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata entry for one indexed file or directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedRecord {
    /// Final path component.
    pub name: String,
    /// Full traversed path.
    pub path: String,
    /// Byte count from the entry's metadata.
    pub size: i64,
    /// Numeric owner identity.
    pub owner: u32,
    pub tag: TypeTag,
}

impl IndexedRecord {
    /// Builds a record, truncating `name`/`path` to their field limits.
    /// Truncation is reported once per field via the log.
    pub fn new(name: &str, path: &str, size: i64, owner: u32, tag: TypeTag) -> Self {
        Self {
            name: bounded(name, NAME_LIMIT, "name", path),
            path: bounded(path, PATH_LIMIT, "path", path),
            size,
            owner,
            tag,
        }
    }

    /// Encodes into a record-sized buffer.
    ///
    /// # Panics
    /// Panics if `buf` is not exactly `RECORD_LEN` bytes; callers hand in
    /// slots carved from the mapped region.
    pub fn encode(&self, buf: &mut [u8]) {
        assert_eq!(buf.len(), RECORD_LEN, "record slot size mismatch");
        buf.fill(0);
        write_text(&mut buf[NAME_OFFSET..NAME_OFFSET + NAME_FIELD], &self.name);
        write_text(&mut buf[PATH_OFFSET..PATH_OFFSET + PATH_FIELD], &self.path);
        buf[SIZE_OFFSET..SIZE_OFFSET + 8].copy_from_slice(&self.size.to_le_bytes());
        buf[OWNER_OFFSET..OWNER_OFFSET + 4].copy_from_slice(&self.owner.to_le_bytes());
        write_text(&mut buf[TAG_OFFSET..TAG_OFFSET + TAG_FIELD], self.tag.as_str());
    }

    /// Decodes a record from a record-sized buffer. An unknown tag decodes
    /// as `Directory`, matching the legacy count semantics where anything
    /// that is not a known file tag falls into the folder bucket.
    pub fn decode(buf: &[u8]) -> Self {
        assert_eq!(buf.len(), RECORD_LEN, "record slot size mismatch");
        let size = i64::from_le_bytes(buf[SIZE_OFFSET..SIZE_OFFSET + 8].try_into().unwrap());
        let owner = u32::from_le_bytes(buf[OWNER_OFFSET..OWNER_OFFSET + 4].try_into().unwrap());
        let tag = TypeTag::from_str(&read_text(&buf[TAG_OFFSET..TAG_OFFSET + TAG_FIELD]))
            .unwrap_or(TypeTag::Directory);
        Self {
            name: read_text(&buf[NAME_OFFSET..NAME_OFFSET + NAME_FIELD]),
            path: read_text(&buf[PATH_OFFSET..PATH_OFFSET + PATH_FIELD]),
            size,
            owner,
            tag,
        }
    }
}

/// Truncates `raw` to at most `limit` bytes on a char boundary.
fn bounded(raw: &str, limit: usize, field: &str, context: &str) -> String {
    if raw.len() <= limit {
        return raw.to_string();
    }
    let mut end = limit;
    while end > 0 && !raw.is_char_boundary(end) {
        end -= 1;
    }
    log::warn!("{field} over {limit} byte limit, truncating: {context}");
    raw[..end].to_string()
}

fn write_text(field: &mut [u8], text: &str) {
    let bytes = text.as_bytes();
    debug_assert!(bytes.len() < field.len(), "text must fit with a NUL byte");
    field[..bytes.len()].copy_from_slice(bytes);
}

fn read_text(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> IndexedRecord {
        IndexedRecord::new("photo.jpg", "/srv/pics/photo.jpg", 4096, 1000, TypeTag::Jpeg)
    }

    #[test]
    fn encode_decode_roundtrip() {
        let record = sample();
        let mut buf = [0u8; RECORD_LEN];
        record.encode(&mut buf);
        assert_eq!(IndexedRecord::decode(&buf), record);
    }

    #[test]
    fn record_width_matches_layout() {
        assert_eq!(RECORD_LEN, 101 + 301 + 8 + 4 + 8);
    }

    #[test]
    fn directory_tag_is_zero_string() {
        let mut buf = [0u8; RECORD_LEN];
        IndexedRecord::new("d", "/d", 0, 0, TypeTag::Directory).encode(&mut buf);
        assert_eq!(buf[TAG_OFFSET], b'0');
        assert_eq!(buf[TAG_OFFSET + 1], 0);
    }

    #[test]
    fn long_name_truncated_at_limit() {
        let name = "x".repeat(NAME_LIMIT + 40);
        let record = IndexedRecord::new(&name, "/p", 1, 0, TypeTag::Png);
        assert_eq!(record.name.len(), NAME_LIMIT);

        let mut buf = [0u8; RECORD_LEN];
        record.encode(&mut buf);
        assert_eq!(IndexedRecord::decode(&buf).name, record.name);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        // 'é' is two bytes; position the limit inside the final char.
        let name = format!("{}é", "a".repeat(NAME_LIMIT - 1));
        let record = IndexedRecord::new(&name, "/p", 1, 0, TypeTag::Png);
        assert_eq!(record.name, "a".repeat(NAME_LIMIT - 1));
    }

    #[test]
    fn long_path_truncated_at_limit() {
        let path = format!("/{}", "y".repeat(PATH_LIMIT + 10));
        let record = IndexedRecord::new("y", &path, 1, 0, TypeTag::Zip);
        assert_eq!(record.path.len(), PATH_LIMIT);
    }

    #[test]
    fn unknown_tag_decodes_as_directory() {
        let mut buf = [0u8; RECORD_LEN];
        sample().encode(&mut buf);
        buf[TAG_OFFSET..TAG_OFFSET + 8].copy_from_slice(b"webp\0\0\0\0");
        assert_eq!(IndexedRecord::decode(&buf).tag, TypeTag::Directory);
    }
}
