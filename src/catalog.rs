use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use thiserror::Error;

const BUILTIN_FALLBACK_JSON: &str = include_str!("../assets/fallback_catalog.json");
const BUILTIN_CLASS_NAMES_JSON: &str = include_str!("../assets/class_names.json");

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {what}: {source}")]
    Parse {
        what: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{0} is empty")]
    Empty(&'static str),
    #[error("{what} contains duplicate key '{key}'")]
    DuplicateKey { what: &'static str, key: String },
    #[error("{what} contains an empty key")]
    EmptyKey { what: &'static str },
    #[error("{what} entry '{key}' has an empty recommendation")]
    EmptyRecommendation { what: &'static str, key: String },
}

pub type Result<T> = std::result::Result<T, ConfigurationError>;

#[derive(Debug, Clone, Default)]
pub struct DefectCatalog {
    entries: BTreeMap<String, String>,
}

impl DefectCatalog {
    pub fn from_entries(entries: Vec<(String, String)>) -> Result<Self> {
        const WHAT: &str = "defect catalog";

        if entries.is_empty() {
            return Err(ConfigurationError::Empty(WHAT));
        }

        let mut map = BTreeMap::new();
        for (key, recommendation) in entries {
            validate_entry(WHAT, &key, &recommendation)?;
            if map.contains_key(&key) {
                return Err(ConfigurationError::DuplicateKey { what: WHAT, key });
            }
            map.insert(key, recommendation);
        }

        Ok(Self { entries: map })
    }

    pub fn from_json_str(raw: &str, what: &str) -> Result<Self> {
        let pairs: OrderedPairs =
            serde_json::from_str(raw).map_err(|source| ConfigurationError::Parse {
                what: what.to_string(),
                source,
            })?;
        Self::from_entries(pairs.0)
    }

    /// Loads the catalog once at startup. An absent file yields an empty
    /// catalog; a present file must satisfy every catalog invariant.
    pub fn load_or_empty(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(raw) => Self::from_json_str(&raw, &path.display().to_string()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigurationError::Read {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    pub fn get(&self, defect: &str) -> Option<&str> {
        self.entries.get(defect).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackEntry {
    pub defect: String,
    pub recommendation: String,
}

#[derive(Debug, Clone)]
pub struct FallbackCatalog {
    entries: Vec<FallbackEntry>,
}

impl FallbackCatalog {
    pub fn from_entries(entries: Vec<(String, String)>) -> Result<Self> {
        const WHAT: &str = "fallback catalog";

        if entries.is_empty() {
            return Err(ConfigurationError::Empty(WHAT));
        }

        let entries = entries
            .into_iter()
            .map(|(defect, recommendation)| -> Result<FallbackEntry> {
                validate_entry(WHAT, &defect, &recommendation)?;
                Ok(FallbackEntry {
                    defect,
                    recommendation,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { entries })
    }

    pub fn from_json_str(raw: &str, what: &str) -> Result<Self> {
        let pairs: Vec<(String, String)> =
            serde_json::from_str(raw).map_err(|source| ConfigurationError::Parse {
                what: what.to_string(),
                source,
            })?;
        Self::from_entries(pairs)
    }

    pub fn builtin() -> Result<Self> {
        Self::from_json_str(BUILTIN_FALLBACK_JSON, "built-in fallback catalog")
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Self::builtin();
        };

        let raw = fs::read_to_string(path).map_err(|source| ConfigurationError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw, &path.display().to_string())
    }

    pub fn entries(&self) -> &[FallbackEntry] {
        &self.entries
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassList {
    names: Vec<String>,
}

impl ClassList {
    pub fn from_names(names: Vec<String>) -> Result<Self> {
        const WHAT: &str = "class list";

        if names.is_empty() {
            return Err(ConfigurationError::Empty(WHAT));
        }

        let mut seen = HashSet::new();
        for name in &names {
            if name.trim().is_empty() {
                return Err(ConfigurationError::EmptyKey { what: WHAT });
            }
            if !seen.insert(name.as_str()) {
                return Err(ConfigurationError::DuplicateKey {
                    what: WHAT,
                    key: name.clone(),
                });
            }
        }

        Ok(Self { names })
    }

    pub fn builtin() -> Result<Self> {
        let names: Vec<String> = serde_json::from_str(BUILTIN_CLASS_NAMES_JSON).map_err(
            |source| ConfigurationError::Parse {
                what: "built-in class list".to_string(),
                source,
            },
        )?;
        Self::from_names(names)
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Self::builtin();
        };

        let raw = fs::read_to_string(path).map_err(|source| ConfigurationError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let names: Vec<String> =
            serde_json::from_str(&raw).map_err(|source| ConfigurationError::Parse {
                what: path.display().to_string(),
                source,
            })?;
        Self::from_names(names)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn name(&self, class_id: u32) -> Option<&str> {
        self.names.get(class_id as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }
}

fn validate_entry(what: &'static str, key: &str, recommendation: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(ConfigurationError::EmptyKey { what });
    }
    if recommendation.trim().is_empty() {
        return Err(ConfigurationError::EmptyRecommendation {
            what,
            key: key.to_string(),
        });
    }
    Ok(())
}

struct OrderedPairs(Vec<(String, String)>);

impl<'de> Deserialize<'de> for OrderedPairs {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct PairsVisitor;

        impl<'de> Visitor<'de> for PairsVisitor {
            type Value = OrderedPairs;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a JSON object mapping strings to strings")
            }

            fn visit_map<A>(self, mut access: A) -> std::result::Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut pairs = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, value)) = access.next_entry::<String, String>()? {
                    pairs.push((key, value));
                }
                Ok(OrderedPairs(pairs))
            }
        }

        deserializer.deserialize_map(PairsVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(key: &str, value: &str) -> (String, String) {
        (key.to_string(), value.to_string())
    }

    #[test]
    fn catalog_lookup_is_exact_and_case_sensitive() {
        let catalog =
            DefectCatalog::from_entries(vec![pair("Potholes", "Patch with asphalt")]).unwrap();

        assert_eq!(catalog.get("Potholes"), Some("Patch with asphalt"));
        assert_eq!(catalog.get("potholes"), None);
        assert_eq!(catalog.get("Potholes "), None);
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn empty_catalog_is_a_configuration_error() {
        let err = DefectCatalog::from_json_str("{}", "test").unwrap_err();
        assert!(matches!(err, ConfigurationError::Empty("defect catalog")));
    }

    #[test]
    fn duplicate_json_keys_are_rejected() {
        let raw = r#"{"Potholes": "Patch", "Potholes": "Fill"}"#;
        let err = DefectCatalog::from_json_str(raw, "test").unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::DuplicateKey { key, .. } if key == "Potholes"
        ));
    }

    #[test]
    fn empty_recommendation_is_rejected() {
        let err = DefectCatalog::from_json_str(r#"{"Rutting": "  "}"#, "test").unwrap_err();
        assert!(matches!(err, ConfigurationError::EmptyRecommendation { .. }));

        let err = FallbackCatalog::from_entries(vec![pair("Rutting", "")]).unwrap_err();
        assert!(matches!(err, ConfigurationError::EmptyRecommendation { .. }));
    }

    #[test]
    fn non_string_values_fail_to_parse() {
        let err = DefectCatalog::from_json_str(r#"{"Potholes": 3}"#, "test").unwrap_err();
        assert!(matches!(err, ConfigurationError::Parse { .. }));
    }

    #[test]
    fn missing_catalog_file_loads_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let catalog = DefectCatalog::load_or_empty(&dir.path().join("repairs.json")).unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn present_but_empty_catalog_file_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("repairs.json");
        fs::write(&path, "{}").expect("write");

        assert!(matches!(
            DefectCatalog::load_or_empty(&path),
            Err(ConfigurationError::Empty(_))
        ));
    }

    #[test]
    fn empty_fallback_is_rejected() {
        let err = FallbackCatalog::from_entries(Vec::new()).unwrap_err();
        assert!(matches!(err, ConfigurationError::Empty("fallback catalog")));
    }

    #[test]
    fn builtin_fallback_keeps_document_order() {
        let fallback = FallbackCatalog::builtin().unwrap();
        assert_eq!(fallback.entries().len(), 15);
        assert!(fallback.entries()[0].defect.ends_with("Depression"));
        assert!(fallback.entries()[14].defect.ends_with("Block Cracking"));
    }

    #[test]
    fn builtin_class_list_has_fourteen_classes() {
        let classes = ClassList::builtin().unwrap();
        assert_eq!(classes.len(), 14);
        assert_eq!(classes.name(5), Some("Potholes"));
        assert_eq!(classes.name(14), None);
    }

    #[test]
    fn class_list_rejects_duplicates() {
        let err = ClassList::from_names(vec!["Potholes".into(), "Potholes".into()]).unwrap_err();
        assert!(matches!(err, ConfigurationError::DuplicateKey { .. }));
    }
}
