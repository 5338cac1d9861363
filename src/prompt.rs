use std::fmt;

use serde_json::Value;

use crate::config::{MAX_PROMPT_CHARS, USER_INSTRUCTION_PREFIX};
use crate::error::ValidationError;

/// A validated, immutable user prompt.
///
/// Non-empty after trimming and at most [`MAX_PROMPT_CHARS`] Unicode scalar
/// values long. The original text is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt(String);

impl Prompt {
    pub fn new(text: impl Into<String>) -> Result<Self, ValidationError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(ValidationError::EmptyPrompt);
        }
        let len = text.chars().count();
        if len > MAX_PROMPT_CHARS {
            return Err(ValidationError::too_long(len));
        }
        Ok(Self(text))
    }

    /// Validates the `prompt` member of a request body.
    pub fn parse(value: Option<&Value>) -> Result<Self, ValidationError> {
        match value {
            None | Some(Value::Null) => Err(ValidationError::MissingPrompt),
            Some(Value::String(text)) => Self::new(text.as_str()),
            Some(_) => Err(ValidationError::PromptNotText),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The user-role instruction sent to the generation provider.
    pub fn user_instruction(&self) -> String {
        format!("{USER_INSTRUCTION_PREFIX}{}", self.0)
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::Prompt;
    use crate::error::ValidationError;

    #[test]
    fn accepts_boundary_length() {
        let text = "a".repeat(2000);
        assert_eq!(Prompt::new(text.clone()).map(|p| p.as_str().len()), Ok(2000));
        assert_eq!(
            Prompt::new(format!("{text}b")),
            Err(ValidationError::PromptTooLong { len: 2001, max: 2000 })
        );
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        let text = "é".repeat(2000);
        assert!(Prompt::new(text).is_ok());
    }

    #[test]
    fn whitespace_only_prompt_is_empty() {
        assert_eq!(Prompt::new(" \n\t "), Err(ValidationError::EmptyPrompt));
    }

    #[test]
    fn parse_distinguishes_missing_and_non_text() {
        assert_eq!(Prompt::parse(None), Err(ValidationError::MissingPrompt));
        assert_eq!(
            Prompt::parse(Some(&json!(null))),
            Err(ValidationError::MissingPrompt)
        );
        assert_eq!(
            Prompt::parse(Some(&json!(42))),
            Err(ValidationError::PromptNotText)
        );
        assert_eq!(
            Prompt::parse(Some(&json!("a counter"))).map(|p| p.user_instruction()),
            Ok("Create a React component: a counter".to_string())
        );
    }
}
