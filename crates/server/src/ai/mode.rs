use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::error::Error;

/// Assistant persona selected per chat request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    General,
    Code,
    Research,
    Video,
    Logo,
}

impl Mode {
    pub const ALL: [Mode; 5] = [
        Mode::General,
        Mode::Code,
        Mode::Research,
        Mode::Video,
        Mode::Logo,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::General => "general",
            Mode::Code => "code",
            Mode::Research => "research",
            Mode::Video => "video",
            Mode::Logo => "logo",
        }
    }

    pub fn system_prompt(self) -> &'static str {
        match self {
            Mode::General => "You are Ladybug AI, a helpful and friendly AI assistant created to help users with various tasks. Be concise, accurate, and helpful.",
            Mode::Code => "You are Ladybug AI, an expert programming assistant. Help users with coding tasks, debugging, and software development. Provide clean, well-commented code with explanations.",
            Mode::Research => "You are Ladybug AI, a research assistant. Help users find information, analyze data, and provide comprehensive, well-sourced insights on topics.",
            Mode::Video => "You are Ladybug AI, a video editing assistant. Help users with video editing concepts, scripts, storyboards, and video production advice.",
            Mode::Logo => "You are Ladybug AI, a logo design assistant. Help users brainstorm logo ideas, understand design principles, and create effective brand identities.",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Mode::ALL
            .into_iter()
            .find(|m| m.as_str() == wanted)
            .ok_or_else(|| {
                Error::Validation(format!(
                    "Unknown mode {:?}; expected one of general, code, research, video, logo",
                    s
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_mode_has_a_distinct_instruction() {
        let prompts: std::collections::HashSet<_> =
            Mode::ALL.iter().map(|m| m.system_prompt()).collect();
        assert_eq!(prompts.len(), Mode::ALL.len());
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("Code".parse::<Mode>().unwrap(), Mode::Code);
        assert_eq!(" logo ".parse::<Mode>().unwrap(), Mode::Logo);
        assert!(matches!("poetry".parse::<Mode>(), Err(Error::Validation(_))));
    }
}
