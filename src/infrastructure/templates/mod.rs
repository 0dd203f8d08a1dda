//! Prompt templates rendered with minijinja

pub mod renderer;

pub use renderer::{PromptTemplate, TemplateRenderer, DEFAULT_PROMPTS};
