use std::collections::BTreeMap;
use std::io::{self, Read};
use thiserror::Error;

use model::EntryDescriptor;

#[derive(Debug, Error)]
pub enum EntryError {
    /// The entry bytes cannot be interpreted. Aborts the enclosing archive.
    #[error("corrupt entry {name}: {reason}")]
    Corrupt { name: String, reason: String },
    #[error("failed to read entry {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },
}

/// Describes individual archive entries during the full pass.
///
/// Implementations are shared by every worker thread.
pub trait EntryInspector: Send + Sync {
    /// Whether `name` should be handed to [`EntryInspector::inspect`].
    fn accepts(&self, name: &str) -> bool;

    fn inspect(
        &self,
        name: &str,
        size: u64,
        reader: &mut dyn Read,
    ) -> Result<EntryDescriptor, EntryError>;
}

const CLASS_MAGIC: [u8; 4] = [0xCA, 0xFE, 0xBA, 0xBE];

/// Checks the header of compiled class entries and records their format
/// version.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClassHeaderInspector;

impl EntryInspector for ClassHeaderInspector {
    fn accepts(&self, name: &str) -> bool {
        name.ends_with(".class") && !name.ends_with("$.class")
    }

    fn inspect(
        &self,
        name: &str,
        size: u64,
        reader: &mut dyn Read,
    ) -> Result<EntryDescriptor, EntryError> {
        let mut header = [0u8; 8];
        let mut filled = 0;
        while filled < header.len() {
            match reader.read(&mut header[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(source) => {
                    return Err(EntryError::Io {
                        name: name.to_string(),
                        source,
                    })
                }
            }
        }
        if filled < header.len() {
            return Err(EntryError::Corrupt {
                name: name.to_string(),
                reason: format!("truncated header ({filled} bytes)"),
            });
        }
        if header[..4] != CLASS_MAGIC {
            return Err(EntryError::Corrupt {
                name: name.to_string(),
                reason: "bad magic".to_string(),
            });
        }
        let minor = u16::from_be_bytes([header[4], header[5]]);
        let major = u16::from_be_bytes([header[6], header[7]]);
        let mut attributes = BTreeMap::new();
        attributes.insert("major".to_string(), major.to_string());
        attributes.insert("minor".to_string(), minor.to_string());
        Ok(EntryDescriptor {
            name: name.to_string(),
            size,
            attributes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_format_version() {
        let bytes = [0xCA, 0xFE, 0xBA, 0xBE, 0, 0, 0, 52, 1, 2, 3];
        let d = ClassHeaderInspector
            .inspect("a/B.class", bytes.len() as u64, &mut Cursor::new(bytes))
            .unwrap();
        assert_eq!(d.attributes["major"], "52");
        assert_eq!(d.size, 11);
    }

    #[test]
    fn rejects_bad_magic_and_short_input() {
        let bad = ClassHeaderInspector.inspect("x.class", 8, &mut Cursor::new([0u8; 8]));
        assert!(matches!(bad, Err(EntryError::Corrupt { .. })));
        let short = ClassHeaderInspector.inspect("x.class", 2, &mut Cursor::new([0xCA, 0xFE]));
        assert!(matches!(short, Err(EntryError::Corrupt { .. })));
    }

    #[test]
    fn filters_names() {
        assert!(ClassHeaderInspector.accepts("pkg/Thing.class"));
        assert!(!ClassHeaderInspector.accepts("pkg/Thing$.class"));
        assert!(!ClassHeaderInspector.accepts("assets/logo.png"));
    }
}
