use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use ts_rs::TS;

/// Canonical document category shared across backend and frontend.
///
/// The list is intentionally finite and comprised of storage safe
/// identifiers.  The generated TypeScript binding is treated as the
/// source of truth for the UI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "../bindings/", rename_all = "snake_case")]
pub enum DocumentCategory {
    Identity,
    Medical,
    Education,
    Financial,
    Property,
    Other,
}

impl DocumentCategory {
    pub const ALL: [DocumentCategory; 6] = [
        DocumentCategory::Identity,
        DocumentCategory::Medical,
        DocumentCategory::Education,
        DocumentCategory::Financial,
        DocumentCategory::Property,
        DocumentCategory::Other,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            DocumentCategory::Identity => "identity",
            DocumentCategory::Medical => "medical",
            DocumentCategory::Education => "education",
            DocumentCategory::Financial => "financial",
            DocumentCategory::Property => "property",
            DocumentCategory::Other => "other",
        }
    }

    pub fn iter() -> impl Iterator<Item = DocumentCategory> {
        Self::ALL.into_iter()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid document category: {value}")]
pub struct DocumentCategoryError {
    value: String,
}

impl DocumentCategoryError {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl FromStr for DocumentCategory {
    type Err = DocumentCategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "identity" => Ok(DocumentCategory::Identity),
            "medical" => Ok(DocumentCategory::Medical),
            "education" => Ok(DocumentCategory::Education),
            "financial" => Ok(DocumentCategory::Financial),
            "property" => Ok(DocumentCategory::Property),
            "other" => Ok(DocumentCategory::Other),
            other => Err(DocumentCategoryError::new(other)),
        }
    }
}

impl fmt::Display for DocumentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category selector for the documents list. `All` is the UI's default
/// option and must not be confused with a real category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(DocumentCategory),
}

impl CategoryFilter {
    pub fn matches(self, category: DocumentCategory) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(selected) => selected == category,
        }
    }
}

impl FromStr for CategoryFilter {
    type Err = DocumentCategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "all" {
            Ok(CategoryFilter::All)
        } else {
            DocumentCategory::from_str(s).map(CategoryFilter::Only)
        }
    }
}
