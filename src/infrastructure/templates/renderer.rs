//! minijinja-backed prompt renderer

use minijinja::{Environment, UndefinedBehavior};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use crate::domain::models::Prompt;
use crate::domain::ports::{PromptRenderer, TemplateError};

/// Built-in prompt set.
pub const DEFAULT_PROMPTS: &str = include_str!("default_prompts.yaml");

/// One prompt template as written in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptTemplate {
    /// System part, may be empty
    #[serde(default)]
    pub system: String,
    /// User part
    pub user: String,
}

/// Renders prompt templates keyed by name.
///
/// Every variable a template references must be present; a missing one is a
/// render error rather than an empty string.
pub struct TemplateRenderer {
    env: Environment<'static>,
}

impl TemplateRenderer {
    /// Renderer over the built-in prompt set
    pub fn builtin() -> Result<Self, TemplateError> {
        Self::from_templates(parse_templates(DEFAULT_PROMPTS)?)
    }

    /// Built-in prompts with the templates in `path` taking precedence
    pub fn with_overrides(path: &Path) -> Result<Self, TemplateError> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| TemplateError::Load(format!("{}: {e}", path.display())))?;
        let mut templates = parse_templates(DEFAULT_PROMPTS)?;
        let overrides = parse_templates(&yaml)?;
        debug!(count = overrides.len(), path = %path.display(), "Loaded prompt overrides");
        templates.extend(overrides);
        Self::from_templates(templates)
    }

    /// Renderer over exactly `templates`
    pub fn from_templates(templates: BTreeMap<String, PromptTemplate>) -> Result<Self, TemplateError> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_keep_trailing_newline(true);

        for (key, template) in templates {
            for (part, source) in [("system", template.system), ("user", template.user)] {
                let name = format!("{key}.{part}");
                env.add_template_owned(name.clone(), source)
                    .map_err(|e| TemplateError::Load(format!("{name}: {e}")))?;
            }
        }

        Ok(Self { env })
    }
}

fn parse_templates(yaml: &str) -> Result<BTreeMap<String, PromptTemplate>, TemplateError> {
    serde_yaml::from_str(yaml).map_err(|e| TemplateError::Load(e.to_string()))
}

impl PromptRenderer for TemplateRenderer {
    fn render(&self, template_key: &str, variables: &serde_json::Value) -> Result<Prompt, TemplateError> {
        let render_part = |part: &str| -> Result<String, TemplateError> {
            let template = self
                .env
                .get_template(&format!("{template_key}.{part}"))
                .map_err(|_| TemplateError::UnknownTemplate(template_key.to_string()))?;
            template.render(variables).map_err(|e| TemplateError::Render {
                key: template_key.to_string(),
                message: e.to_string(),
            })
        };

        let user = render_part("user")?;
        let system = render_part("system")?;

        Ok(Prompt::new(
            Some(system).filter(|s| !s.trim().is_empty()),
            user,
        ))
    }
}
