use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::models::AppError;

const BUILTIN_PLACES: &str = include_str!("../data/places.json");

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Place {
    pub name: String,
    pub description: String,
}

/// Static list of destinations served by `GET /api/places`.
#[derive(Debug, Clone, Default)]
pub struct PlaceCatalog { places: Vec<Place> }

impl PlaceCatalog {
    pub fn builtin() -> Result<Self, AppError> { Self::from_json(BUILTIN_PLACES) }

    pub fn from_json(raw: &str) -> Result<Self, AppError> {
        let places = serde_json::from_str(raw).map_err(|e| AppError::Validation(format!("invalid places list: {e}")))?;
        Ok(Self { places })
    }

    /// Reads the catalog from `path`, or falls back to the built-in list.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        match path {
            Some(p) => Self::from_json(&std::fs::read_to_string(p)?),
            None => Self::builtin(),
        }
    }

    pub fn places(&self) -> &[Place] { &self.places }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_list_parses() {
        let catalog = PlaceCatalog::builtin().unwrap();
        assert!(!catalog.places().is_empty());
        assert!(catalog.places().iter().all(|p| !p.name.is_empty() && !p.description.is_empty()));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("places.json");
        std::fs::write(&path, r#"[{"name":"Hampi","description":"Boulders and ruins"}]"#).unwrap();
        let catalog = PlaceCatalog::load(Some(path.as_path())).unwrap();
        assert_eq!(catalog.places(), &[Place { name: "Hampi".into(), description: "Boulders and ruins".into() }]);
    }

    #[test]
    fn malformed_file_is_an_error() {
        assert!(PlaceCatalog::from_json("{not json").is_err());
    }
}
