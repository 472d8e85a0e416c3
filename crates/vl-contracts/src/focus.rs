use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Analysis lens selecting which instruction is sent with the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FocusArea {
    #[default]
    Code,
    Architecture,
    Error,
    Documentation,
}

impl FocusArea {
    pub const ALL: [FocusArea; 4] = [
        FocusArea::Code,
        FocusArea::Architecture,
        FocusArea::Error,
        FocusArea::Documentation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FocusArea::Code => "code",
            FocusArea::Architecture => "architecture",
            FocusArea::Error => "error",
            FocusArea::Documentation => "documentation",
        }
    }

    pub fn instruction(self) -> &'static str {
        match self {
            FocusArea::Code => CODE_INSTRUCTION,
            FocusArea::Architecture => ARCHITECTURE_INSTRUCTION,
            FocusArea::Error => ERROR_INSTRUCTION,
            FocusArea::Documentation => DOCUMENTATION_INSTRUCTION,
        }
    }
}

impl fmt::Display for FocusArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FocusArea {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let lowered = raw.trim().to_ascii_lowercase();
        FocusArea::ALL
            .into_iter()
            .find(|area| area.as_str() == lowered)
            .ok_or_else(|| {
                format!(
                    "unknown focus area '{raw}' (expected one of: code, architecture, error, documentation)"
                )
            })
    }
}

const CODE_INSTRUCTION: &str = "Describe the content of this image, covering:
1. What the image shows
2. All text it contains
3. Its visual elements and layout
4. The overall visual impression

Give an objective description; do not perform code review.";

const ARCHITECTURE_INSTRUCTION: &str = "Describe the visual structure and layout of this image:
1. The overall layout
2. The main visual elements
3. How text and graphics are arranged
4. Notable colors and styling";

const ERROR_INSTRUCTION: &str = "Describe anything in this image that deserves attention:
1. Image clarity
2. Legibility of the text
3. Visual problems or defects
4. Areas that need particular attention";

const DOCUMENTATION_INSTRUCTION: &str = "Describe this image in full detail:
1. Its subject and content
2. Every piece of text it contains
3. Visual elements and layout
4. The overall visual impression";

#[cfg(test)]
mod tests {
    use super::FocusArea;

    #[test]
    fn default_focus_is_code() {
        assert_eq!(FocusArea::default(), FocusArea::Code);
    }

    #[test]
    fn parses_case_insensitively_and_rejects_unknown() {
        assert_eq!("Error".parse::<FocusArea>(), Ok(FocusArea::Error));
        assert_eq!(
            " documentation ".parse::<FocusArea>(),
            Ok(FocusArea::Documentation)
        );
        let err = "general".parse::<FocusArea>().unwrap_err();
        assert!(err.contains("unknown focus area 'general'"));
    }

    #[test]
    fn serde_uses_lowercase_names() -> Result<(), serde_json::Error> {
        assert_eq!(
            serde_json::to_string(&FocusArea::Architecture)?,
            "\"architecture\""
        );
        let parsed: FocusArea = serde_json::from_str("\"error\"")?;
        assert_eq!(parsed, FocusArea::Error);
        Ok(())
    }

    #[test]
    fn every_focus_area_has_a_distinct_instruction() {
        let mut seen = Vec::new();
        for area in FocusArea::ALL {
            let instruction = area.instruction();
            assert!(instruction.contains("1."), "{area} instruction is not a list");
            assert!(!seen.contains(&instruction));
            seen.push(instruction);
        }
        assert!(FocusArea::Documentation
            .instruction()
            .contains("Every piece of text"));
        assert!(FocusArea::Error.instruction().contains("clarity"));
    }
}
