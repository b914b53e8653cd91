//! Substring-based error classification.
//!
//! Import errors arrive as free-form messages from the executor, in more than
//! one language. Classification is a pure function: case-insensitive
//! substring matching against per-category synonym groups, evaluated in a
//! fixed priority order, first match wins. The synonym lists are injectable
//! configuration so a deployment can localize without touching the algorithm.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Category tag attached to every ledger record.
/// This is the CANONICAL definition - use this everywhere.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    /// Source file name did not parse into record metadata
    FilenameParsing,
    /// Destination store rejected the write
    Database,
    /// PDF content extraction failed
    PdfParsing,
    /// Referenced item or resource missing
    NotFound,
    /// Access denied on source or destination
    Permission,
    /// Malformed or invalid record data
    FormatError,
    /// The chunk call itself failed (transport/unhandled), not an item error
    ServerError,
    /// Anything the classifier could not place
    #[default]
    General,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::FilenameParsing => "FILENAME_PARSING",
            ErrorCategory::Database => "DATABASE",
            ErrorCategory::PdfParsing => "PDF_PARSING",
            ErrorCategory::NotFound => "NOT_FOUND",
            ErrorCategory::Permission => "PERMISSION",
            ErrorCategory::FormatError => "FORMAT_ERROR",
            ErrorCategory::ServerError => "SERVER_ERROR",
            ErrorCategory::General => "GENERAL",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ErrorCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "FILENAME_PARSING" => Ok(ErrorCategory::FilenameParsing),
            "DATABASE" => Ok(ErrorCategory::Database),
            "PDF_PARSING" => Ok(ErrorCategory::PdfParsing),
            "NOT_FOUND" => Ok(ErrorCategory::NotFound),
            "PERMISSION" => Ok(ErrorCategory::Permission),
            "FORMAT_ERROR" => Ok(ErrorCategory::FormatError),
            "SERVER_ERROR" => Ok(ErrorCategory::ServerError),
            "GENERAL" => Ok(ErrorCategory::General),
            _ => Err(format!("Invalid error category: '{}'", s)),
        }
    }
}

/// Per-category synonym lists. Each list is a disjunction: any token matching
/// the message (case-insensitive substring) satisfies that group.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SynonymConfig {
    pub filename: Vec<String>,
    pub database: Vec<String>,
    pub pdf: Vec<String>,
    pub parsing: Vec<String>,
    pub not_found: Vec<String>,
    pub permission: Vec<String>,
    pub format: Vec<String>,
}

fn tokens(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for SynonymConfig {
    fn default() -> Self {
        // Built-in bilingual (English + Spanish) token sets. Deployments with
        // other source languages override these via TOML.
        Self {
            filename: tokens(&["filename", "file name", "nombre de archivo", "nombre del archivo"]),
            database: tokens(&["database", "insert", "base de datos", "insercion", "inserción"]),
            pdf: tokens(&["pdf"]),
            parsing: tokens(&["parsing", "parse", "analisis", "análisis", "analizar"]),
            not_found: tokens(&["not found", "no encontrado", "no encontrada", "no existe"]),
            permission: tokens(&["permission", "permiso", "acceso denegado"]),
            format: tokens(&["format", "invalid", "formato", "invalido", "inválido", "no valido", "no válido"]),
        }
    }
}

#[derive(Error, Debug)]
pub enum ClassifierConfigError {
    #[error("Failed to read synonym config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse synonym config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// One classification rule: every group must be satisfied by at least one of
/// its tokens. Single-group rules are plain synonym lists; the PDF rule needs
/// both a "pdf" token and a "parsing" token.
#[derive(Debug, Clone)]
struct Rule {
    category: ErrorCategory,
    groups: Vec<Vec<String>>,
}

/// Deterministic, stateless message classifier.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<Rule>,
}

impl Classifier {
    /// Build the rule table in priority order from a synonym config.
    pub fn new(config: SynonymConfig) -> Self {
        let lower = |group: Vec<String>| -> Vec<String> {
            group.into_iter().map(|t| t.to_lowercase()).collect()
        };
        let rules = vec![
            Rule {
                category: ErrorCategory::FilenameParsing,
                groups: vec![lower(config.filename)],
            },
            Rule {
                category: ErrorCategory::Database,
                groups: vec![lower(config.database)],
            },
            Rule {
                category: ErrorCategory::PdfParsing,
                groups: vec![lower(config.pdf), lower(config.parsing)],
            },
            Rule {
                category: ErrorCategory::NotFound,
                groups: vec![lower(config.not_found)],
            },
            Rule {
                category: ErrorCategory::Permission,
                groups: vec![lower(config.permission)],
            },
            Rule {
                category: ErrorCategory::FormatError,
                groups: vec![lower(config.format)],
            },
        ];
        Self { rules }
    }

    /// Load synonym lists from a TOML string.
    pub fn from_toml_str(raw: &str) -> Result<Self, ClassifierConfigError> {
        let config: SynonymConfig = toml::from_str(raw)?;
        Ok(Self::new(config))
    }

    /// Load synonym lists from a TOML file.
    pub fn from_path(path: &Path) -> Result<Self, ClassifierConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Map a raw error message to a category. Pure: same input, same output.
    pub fn classify(&self, message: &str) -> ErrorCategory {
        let haystack = message.to_lowercase();
        for rule in &self.rules {
            let matched = rule
                .groups
                .iter()
                .all(|group| group.iter().any(|token| haystack.contains(token.as_str())));
            if matched {
                return rule.category;
            }
        }
        ErrorCategory::General
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(SynonymConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_is_pure() {
        let classifier = Classifier::default();
        let message = "PDF parsing failed on page 3";
        assert_eq!(classifier.classify(message), classifier.classify(message));
    }

    #[test]
    fn test_classify_case_insensitive() {
        let classifier = Classifier::default();
        assert_eq!(
            classifier.classify("DATABASE INSERT FAILED"),
            ErrorCategory::Database
        );
        assert_eq!(
            classifier.classify("database insert failed"),
            ErrorCategory::Database
        );
    }

    #[test]
    fn test_classify_priority_order() {
        let classifier = Classifier::default();
        // Filename wins over format even when both token sets match
        assert_eq!(
            classifier.classify("invalid filename: expected YYYY-MM-DD prefix"),
            ErrorCategory::FilenameParsing
        );
        // Database wins over not-found
        assert_eq!(
            classifier.classify("database row not found"),
            ErrorCategory::Database
        );
    }

    #[test]
    fn test_pdf_rule_requires_both_groups() {
        let classifier = Classifier::default();
        assert_eq!(
            classifier.classify("pdf parsing failed"),
            ErrorCategory::PdfParsing
        );
        // "pdf" alone is not enough
        assert_eq!(
            classifier.classify("pdf is corrupt"),
            ErrorCategory::General
        );
        // "parsing" alone is not enough
        assert_eq!(
            classifier.classify("parsing took too long"),
            ErrorCategory::General
        );
    }

    #[test]
    fn test_classify_bilingual_synonyms() {
        let classifier = Classifier::default();
        assert_eq!(
            classifier.classify("registro no encontrado en el archivo"),
            ErrorCategory::NotFound
        );
        assert_eq!(
            classifier.classify("permiso denegado"),
            ErrorCategory::Permission
        );
        assert_eq!(
            classifier.classify("formato de fecha no válido"),
            ErrorCategory::FormatError
        );
    }

    #[test]
    fn test_classify_fallback_is_general() {
        let classifier = Classifier::default();
        assert_eq!(classifier.classify("something odd"), ErrorCategory::General);
        assert_eq!(classifier.classify(""), ErrorCategory::General);
    }

    #[test]
    fn test_custom_synonyms_from_toml() {
        let classifier = Classifier::from_toml_str(
            r#"
            not_found = ["introuvable"]
            permission = ["acces refuse"]
            "#,
        )
        .unwrap();
        assert_eq!(
            classifier.classify("fichier introuvable"),
            ErrorCategory::NotFound
        );
        // Default English lists were replaced, not merged
        assert_eq!(
            classifier.classify("record not found"),
            ErrorCategory::General
        );
    }

    #[test]
    fn test_category_roundtrip() {
        for category in [
            ErrorCategory::FilenameParsing,
            ErrorCategory::Database,
            ErrorCategory::PdfParsing,
            ErrorCategory::NotFound,
            ErrorCategory::Permission,
            ErrorCategory::FormatError,
            ErrorCategory::ServerError,
            ErrorCategory::General,
        ] {
            let parsed: ErrorCategory = category.as_str().parse().unwrap();
            assert_eq!(parsed, category);
        }
    }
}
