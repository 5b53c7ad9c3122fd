use std::collections::BTreeMap;

/// Location of the manifest inside an archive.
pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

/// Manifest attributes read by the inspector.
pub mod attr {
    pub const PLUGIN_ID: &str = "Plugin-Id";
    pub const PLUGIN_VERSION: &str = "Plugin-Version";
    /// Comma separated entry paths of archives packaged inside this one.
    pub const NESTED_ARCHIVES: &str = "Nested-Archives";
    pub const TWEAK_CLASS: &str = "Tweak-Class";
    pub const TWEAK_ORDER: &str = "Tweak-Order";
    pub const CORE_PLUGIN: &str = "Core-Plugin";
    pub const CONTAINS_PLUGIN: &str = "Core-Plugin-Contains-Plugin";
    pub const FORCE_LOAD: &str = "Force-Load-As-Plugin";
    /// Names of `META-INF/` entries holding access lists.
    pub const ACCESS_LIST: &str = "Access-List";
    pub const SIDE: &str = "Plugin-Side";
    pub const TYPES: &str = "Plugin-Types";
}

/// Main section of a manifest. Attribute names compare case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    main: BTreeMap<String, String>,
}

impl Manifest {
    /// Parses `Name: value` lines up to the first blank line. Lines starting
    /// with a single space continue the previous value.
    pub fn parse(text: &str) -> Self {
        let mut main = BTreeMap::new();
        let mut current: Option<(String, String)> = None;
        for line in text.lines() {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if let Some(rest) = line.strip_prefix(' ') {
                if let Some((_, value)) = current.as_mut() {
                    value.push_str(rest);
                }
                continue;
            }
            if let Some((name, value)) = current.take() {
                main.insert(name, value);
            }
            if line.trim().is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                current = Some((
                    name.trim().to_ascii_lowercase(),
                    value.strip_prefix(' ').unwrap_or(value).to_string(),
                ));
            }
        }
        if let Some((name, value)) = current {
            main.insert(name, value);
        }
        Self { main }
    }

    /// Trimmed value of `name`, `None` when absent or blank.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.main
            .get(&name.to_ascii_lowercase())
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.main.contains_key(&name.to_ascii_lowercase())
    }

    /// Splits a list attribute on commas and whitespace.
    pub fn list(&self, name: &str) -> Vec<String> {
        self.get(name)
            .map(|v| {
                v.split(|c: char| c == ',' || c.is_whitespace())
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.main.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn continuation_lines_and_case() {
        let m = Manifest::parse(
            "Manifest-Version: 1.0\r\nNested-Archives: META-INF/libs/a.jar,\r\n  META-INF/libs/b.jar\r\nplugin-id: demo\r\n\r\nName: ignored\r\nPlugin-Id: other\r\n",
        );
        assert_eq!(m.get(attr::PLUGIN_ID), Some("demo"));
        assert_eq!(
            m.list(attr::NESTED_ARCHIVES),
            vec!["META-INF/libs/a.jar", "META-INF/libs/b.jar"]
        );
    }

    #[test]
    fn blank_values_are_absent_but_present() {
        let m = Manifest::parse("Force-Load-As-Plugin: \n");
        assert!(m.contains(attr::FORCE_LOAD));
        assert_eq!(m.get(attr::FORCE_LOAD), None);
        assert!(m.list(attr::TYPES).is_empty());
    }
}
