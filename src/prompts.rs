use std::collections::HashMap;
use std::path::Path;

use crate::error::{Error, Result};

const DEFAULT_REVIEW: &str = include_str!("default_prompts/review-pr.md");

/// Known template variable names for validation.
const KNOWN_VARIABLES: &[&str] = &["requirements", "code_context"];

fn default_template(phase: &str) -> Option<&'static str> {
    match phase {
        "review" => Some(DEFAULT_REVIEW),
        _ => None,
    }
}

fn template_filename(phase: &str) -> String {
    format!("{phase}-pr.md")
}

/// Prompt template engine with an embedded default and user overrides.
pub struct PromptEngine {
    override_dir: Option<String>,
}

impl PromptEngine {
    pub fn new(override_dir: Option<String>) -> Self {
        Self { override_dir }
    }

    /// Load a prompt template for the given phase.
    /// User overrides in `override_dir` take precedence over defaults.
    pub fn load_template(&self, phase: &str) -> Result<String> {
        if let Some(ref dir) = self.override_dir {
            let path = Path::new(dir).join(template_filename(phase));
            if path.exists() {
                return std::fs::read_to_string(&path).map_err(|e| {
                    Error::Prompt(format!(
                        "failed to read override template {}: {e}",
                        path.display()
                    ))
                });
            }
        }

        default_template(phase)
            .map(|s| s.to_string())
            .ok_or_else(|| Error::Prompt(format!("unknown prompt phase: {phase}")))
    }

    /// Load a template and render it with the given variables.
    pub fn render_phase(&self, phase: &str, vars: &HashMap<String, String>) -> Result<String> {
        let template = self.load_template(phase)?;
        render_template(&template, vars)
    }

    /// Render the review prompt with the card's requirements and a PR's
    /// aggregated code context embedded verbatim.
    pub fn render_review(&self, requirements: &str, code_context: &str) -> Result<String> {
        let mut vars = HashMap::new();
        vars.insert("requirements".to_string(), requirements.to_string());
        vars.insert("code_context".to_string(), code_context.to_string());
        self.render_phase("review", &vars)
    }
}

/// Render a template string by substituting `{{variable}}` placeholders.
/// Errors on unknown variables (strict mode).
pub fn render_template(template: &str, vars: &HashMap<String, String>) -> Result<String> {
    let mut result = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '{' && chars.peek() == Some(&'{') {
            chars.next(); // consume second {
            let mut var_name = String::new();
            let mut found_close = false;

            while let Some(c2) = chars.next() {
                if c2 == '}' && chars.peek() == Some(&'}') {
                    chars.next(); // consume second }
                    found_close = true;
                    break;
                }
                var_name.push(c2);
            }

            if !found_close {
                return Err(Error::Prompt(format!(
                    "unclosed template variable: {{{{{var_name}"
                )));
            }

            let var_name = var_name.trim();
            if !KNOWN_VARIABLES.contains(&var_name) {
                return Err(Error::Prompt(format!(
                    "unknown template variable: {var_name}"
                )));
            }

            match vars.get(var_name) {
                Some(value) => result.push_str(value),
                None => {
                    return Err(Error::Prompt(format!(
                        "missing value for template variable: {var_name}"
                    )));
                }
            }
        } else {
            result.push(c);
        }
    }

    Ok(result)
}
