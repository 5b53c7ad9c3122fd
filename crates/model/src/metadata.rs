use serde::{Deserialize, Serialize};

/// Entry holding declared plugin metadata inside an archive.
pub const METADATA_ENTRY: &str = "plugin.json";

/// One plugin declared by an archive's metadata entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredPlugin {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

/// Parsed metadata entry. Accepts either a bare list of plugins or an object
/// wrapping the list under `plugins`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataCollection {
    pub plugins: Vec<DeclaredPlugin>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawMetadata {
    List(Vec<DeclaredPlugin>),
    Wrapped {
        #[serde(default)]
        plugins: Vec<DeclaredPlugin>,
    },
}

impl MetadataCollection {
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        let plugins = match serde_json::from_slice::<RawMetadata>(bytes)? {
            RawMetadata::List(plugins) => plugins,
            RawMetadata::Wrapped { plugins } => plugins,
        };
        Ok(Self { plugins })
    }

    /// Declared versions in declaration order, skipping blanks.
    pub fn declared_versions(&self) -> impl Iterator<Item = &str> {
        self.plugins
            .iter()
            .filter_map(|p| p.version.as_deref())
            .filter(|v| !v.trim().is_empty())
    }

    pub fn first_id(&self) -> Option<&str> {
        self.plugins.iter().find_map(|p| p.id.as_deref())
    }
}
