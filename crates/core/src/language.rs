use serde::{Deserialize, Serialize};

/// Languages the assistant's prompts and detection heuristics understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    French,
    Arabic,
}

impl Default for Language {
    fn default() -> Self {
        Language::French
    }
}

impl Language {
    /// Cheap script-based detection: any Arabic-block codepoint wins, otherwise French.
    pub fn detect(text: &str) -> Self {
        let arabic = text
            .chars()
            .filter(|c| ('\u{0600}'..='\u{06FF}').contains(c))
            .count();
        if arabic > 0 {
            Language::Arabic
        } else {
            Language::French
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Language::French => "fr",
            Language::Arabic => "ar",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_arabic_script() {
        assert_eq!(Language::detect("مرحبا بكم"), Language::Arabic);
    }

    #[test]
    fn defaults_to_french() {
        assert_eq!(Language::detect("Quel est l'emploi du temps?"), Language::French);
        assert_eq!(Language::default(), Language::French);
    }
}
