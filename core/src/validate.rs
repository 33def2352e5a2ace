//! Template and template-set validation.
//!
//! Catches structural problems such as empty keys, keys that cannot be used
//! as export file names, empty bodies and duplicate `(key, format)` pairs
//! before they reach the store or the conversion pipeline.
//!
//! # Examples
//!
//! ```
//! use template_bridge_core::*;
//!
//! let template = Template::source("cisco_ios_show_clock", "Time: (?P<TIME>\\S+)");
//! assert!(validate_template(&template).is_empty());
//!
//! let bad = Template::source("", "");
//! assert_eq!(validate_template(&bad).len(), 2);
//! ```

use std::collections::HashSet;

use thiserror::Error;

use crate::{Template, TemplateFormat};

/// Template validation and parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// Key is empty or whitespace-only.
    #[error("template key cannot be empty")]
    EmptyKey,
    /// Key contains a path separator or control character.
    #[error("invalid template key: {0}")]
    InvalidKey(String),
    /// Body is empty or whitespace-only.
    #[error("template body cannot be empty: {0}")]
    EmptyBody(String),
    /// Two templates in one set share a key and format.
    #[error("duplicate {1} template: {0}")]
    DuplicateKey(String, TemplateFormat),
    /// Format label is not recognized.
    #[error("unknown template format: {0}")]
    UnknownFormat(String),
    /// Strategy label is not recognized.
    #[error("unknown strategy: {0}")]
    UnknownStrategy(String),
}

/// Validates a single template.
pub fn validate_template(template: &Template) -> Vec<TemplateError> {
    let mut errors = Vec::new();

    if template.key.trim().is_empty() {
        errors.push(TemplateError::EmptyKey);
    } else if template
        .key
        .chars()
        .any(|c| c == '/' || c == '\\' || c.is_control())
        || template.key.starts_with('.')
    {
        errors.push(TemplateError::InvalidKey(template.key.clone()));
    }

    if template.body.trim().is_empty() {
        errors.push(TemplateError::EmptyBody(template.key.clone()));
    }

    errors
}

/// Validates a set of templates, including cross-template duplicate checks.
///
/// # Examples
///
/// ```
/// use template_bridge_core::*;
///
/// let set = vec![
///     Template::source("a_show", "x (?P<X>\\d+)"),
///     Template::target("a_show", "x {{ X }}"),
///     Template::source("a_show", "y (?P<Y>\\d+)"),
/// ];
/// let errors = validate_templates(&set);
/// assert_eq!(errors, vec![TemplateError::DuplicateKey("a_show".into(), TemplateFormat::Source)]);
/// ```
pub fn validate_templates(templates: &[Template]) -> Vec<TemplateError> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for template in templates {
        if !seen.insert((template.key.as_str(), template.format)) {
            errors.push(TemplateError::DuplicateKey(
                template.key.clone(),
                template.format,
            ));
        }
        errors.extend(validate_template(template));
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_with_separator_is_rejected() {
        let template = Template::source("cisco/show", "x");
        assert_eq!(
            validate_template(&template),
            vec![TemplateError::InvalidKey("cisco/show".into())]
        );
    }

    #[test]
    fn test_hidden_file_key_is_rejected() {
        let template = Template::target(".hidden", "x");
        assert!(matches!(
            validate_template(&template)[0],
            TemplateError::InvalidKey(_)
        ));
    }

    #[test]
    fn test_whitespace_body_is_empty() {
        let template = Template::source("k", "  \n ");
        assert_eq!(
            validate_template(&template),
            vec![TemplateError::EmptyBody("k".into())]
        );
    }

    #[test]
    fn test_same_key_different_format_is_allowed() {
        let set = vec![Template::source("k", "x"), Template::target("k", "x")];
        assert!(validate_templates(&set).is_empty());
    }
}
