use crate::domain::model::Unit;
use crate::utils::error::{EtlError, Result};
use std::collections::HashSet;
use std::path::Path;

/// Units to report on, in file order. Unit numbers are unique.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitRegistry {
    units: Vec<Unit>,
}

impl UnitRegistry {
    pub fn from_units(units: Vec<Unit>) -> Result<Self> {
        let mut seen = HashSet::new();
        for unit in &units {
            if !seen.insert(unit.number()) {
                return Err(EtlError::InvalidUnitError {
                    reason: format!("unit number {} is listed more than once", unit.number()),
                });
            }
        }
        Ok(Self { units })
    }

    /// Parses a JSON array of `{"name": ..., "number": ...}` records.
    pub fn from_json_str(content: &str) -> Result<Self> {
        let units: Vec<Unit> = serde_json::from_str(content)?;
        Self::from_units(units)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        let registry = Self::from_json_str(&content)?;
        tracing::debug!(
            "Loaded {} units from {}",
            registry.len(),
            path.as_ref().display()
        );
        Ok(registry)
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn find(&self, number: u32) -> Option<&Unit> {
        self.units.iter().find(|u| u.number() == number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_registry_preserves_order() {
        let registry = UnitRegistry::from_json_str(
            r#"[{"name": "Pine Ridge", "number": 456}, {"name": "Oak Hills", "number": 123}]"#,
        )
        .unwrap();

        let names: Vec<&str> = registry.units().iter().map(|u| u.name()).collect();
        assert_eq!(names, vec!["Pine Ridge", "Oak Hills"]);
        assert_eq!(registry.find(123).unwrap().name(), "Oak Hills");
    }

    #[test]
    fn test_registry_rejects_duplicate_numbers() {
        let result = UnitRegistry::from_json_str(
            r#"[{"name": "Oak Hills", "number": 123}, {"name": "Oak Hills 2", "number": 123}]"#,
        );
        assert!(matches!(result, Err(EtlError::InvalidUnitError { .. })));
    }

    #[test]
    fn test_registry_rejects_non_integer_number() {
        let result = UnitRegistry::from_json_str(r#"[{"name": "Oak Hills", "number": "abc"}]"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_registry_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(br#"[{"name": "Oak Hills", "number": 123}]"#)
            .unwrap();

        let registry = UnitRegistry::from_file(temp_file.path()).unwrap();
        assert_eq!(registry.len(), 1);
    }
}
