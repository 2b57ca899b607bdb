//! Technique catalog loading from YAML.
//!
//! Records parse strictly (unknown keys rejected) and the whole document is
//! validated in one pass by [`TechniqueCatalog::try_new`]. The crate ships
//! a builtin catalog so the planner works without any external file.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::domain::models::technique::Technique;
use crate::domain::models::{CatalogError, TechniqueCatalog};

/// Default catalog shipped with the crate.
const BUILTIN_CATALOG_YAML: &str = include_str!("../../../catalog/techniques.yaml");

/// Top-level catalog document shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogDocument {
    pub techniques: Vec<Technique>,
}

/// Catalog loader.
pub struct CatalogLoader;

impl CatalogLoader {
    /// Parse and validate a catalog from YAML text.
    pub fn from_yaml_str(text: &str) -> Result<TechniqueCatalog, CatalogError> {
        let document: CatalogDocument =
            serde_yaml::from_str(text).map_err(|e| CatalogError::Parse(e.to_string()))?;
        TechniqueCatalog::try_new(document.techniques)
    }

    /// Load a catalog from a YAML file.
    pub async fn load_file(path: impl AsRef<Path>) -> Result<TechniqueCatalog, CatalogError> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CatalogError::Io(format!("{}: {e}", path.display())))?;
        let catalog = Self::from_yaml_str(&text)?;
        tracing::info!(
            path = %path.display(),
            techniques = catalog.len(),
            version = catalog.version_hash(),
            "technique catalog loaded"
        );
        Ok(catalog)
    }

    /// The builtin catalog embedded in the binary.
    pub fn builtin() -> Result<TechniqueCatalog, CatalogError> {
        Self::from_yaml_str(BUILTIN_CATALOG_YAML)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::technique::{AttackDomain, Goal, ToolSupport};

    #[test]
    fn test_builtin_catalog_is_valid() {
        let catalog = CatalogLoader::builtin().unwrap();
        assert!(catalog.len() >= 30);
        assert!(catalog.by_id("AP-TX-LLM-EXTRACT-SYSPROMPT").is_some());
    }

    #[test]
    fn test_builtin_catalog_covers_all_domains() {
        let catalog = CatalogLoader::builtin().unwrap();
        assert!(!catalog.by_domain(AttackDomain::Llm).is_empty());
        assert!(!catalog.by_domain(AttackDomain::Agent).is_empty());
        assert!(!catalog.by_domain(AttackDomain::Aml).is_empty());
    }

    #[test]
    fn test_builtin_catalog_resolves_import_tables() {
        let catalog = CatalogLoader::builtin().unwrap();
        for (probe, technique_id) in crate::services::GARAK_PROBE_MAP {
            assert!(
                catalog.by_id(technique_id).is_some(),
                "{probe} maps to unknown technique {technique_id}"
            );
        }
        for (label, technique_id) in crate::services::PROMPTFOO_TEST_MAP {
            assert!(
                catalog.by_id(technique_id).is_some(),
                "{label} maps to unknown technique {technique_id}"
            );
        }
    }

    #[test]
    fn test_builtin_sysprompt_extraction_shape() {
        let catalog = CatalogLoader::builtin().unwrap();
        let technique = catalog.by_id("AP-TX-LLM-EXTRACT-SYSPROMPT").unwrap();
        assert!((technique.signal_value - 1.0).abs() < 1e-12);
        assert!(technique.goals.contains(&Goal::Extraction));
        assert!(technique.tools.contains(&ToolSupport::Garak));
    }

    #[test]
    fn test_unknown_document_key_rejected() {
        let err = CatalogLoader::from_yaml_str("techniques: []\nextra: 1\n").unwrap_err();
        assert!(matches!(err, CatalogError::Parse(_)));
    }

    #[test]
    fn test_queries_preserve_insertion_order() {
        let catalog = CatalogLoader::builtin().unwrap();
        let llm = catalog.by_domain(AttackDomain::Llm);
        let positions: Vec<usize> = llm
            .iter()
            .map(|t| {
                catalog
                    .all()
                    .iter()
                    .position(|c| c.id == t.id)
                    .unwrap()
            })
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }
}
