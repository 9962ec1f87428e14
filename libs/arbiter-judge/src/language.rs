// Static language table
// Names are matched case-sensitively; ids are the engine's language ids

use crate::error::JudgeError;
use arbiter_common::types::LanguageId;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Language {
    pub name: &'static str,
    pub id: LanguageId,
}

const LANGUAGES: &[Language] = &[
    Language { name: "JAVASCRIPT", id: LanguageId(63) },
    Language { name: "PYTHON", id: LanguageId(71) },
    Language { name: "JAVA", id: LanguageId(62) },
    Language { name: "C", id: LanguageId(50) },
    Language { name: "CPP", id: LanguageId(54) },
    Language { name: "GO", id: LanguageId(60) },
    Language { name: "RUST", id: LanguageId(73) },
    Language { name: "TYPESCRIPT", id: LanguageId(74) },
];

/// Resolve a symbolic language name to the engine's id
pub fn resolve(name: &str) -> Result<LanguageId, JudgeError> {
    LANGUAGES
        .iter()
        .find(|lang| lang.name == name)
        .map(|lang| lang.id)
        .ok_or_else(|| JudgeError::UnsupportedLanguage(name.to_string()))
}

/// Reverse lookup, used when reporting
pub fn name_of(id: LanguageId) -> Option<&'static str> {
    LANGUAGES.iter().find(|lang| lang.id == id).map(|lang| lang.name)
}

/// All supported languages in table order
pub fn supported() -> &'static [Language] {
    LANGUAGES
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known() {
        assert_eq!(resolve("PYTHON").unwrap(), LanguageId(71));
        assert_eq!(resolve("JAVA").unwrap(), LanguageId(62));
        assert_eq!(resolve("JAVASCRIPT").unwrap(), LanguageId(63));
    }

    #[test]
    fn test_resolve_is_case_sensitive() {
        let err = resolve("python").unwrap_err();
        assert!(matches!(err, JudgeError::UnsupportedLanguage(ref name) if name == "python"));
    }

    #[test]
    fn test_resolve_unknown() {
        assert!(matches!(resolve("COBOL"), Err(JudgeError::UnsupportedLanguage(_))));
        assert!(matches!(resolve(""), Err(JudgeError::UnsupportedLanguage(_))));
    }

    #[test]
    fn test_name_of_round_trips() {
        for lang in supported() {
            assert_eq!(name_of(lang.id), Some(lang.name));
        }
        assert_eq!(name_of(LanguageId(9999)), None);
    }

    #[test]
    fn test_ids_unique() {
        let mut ids: Vec<u32> = supported().iter().map(|l| l.id.0).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), supported().len());
    }
}
