//! Model catalogue loaded from `models.yaml`, plus per-model system prompts.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};

const MODELS_CONFIG_FILENAME: &str = "models.yaml";
const PROMPTS_FOLDER_NAME: &str = "prompts";

/// One configured LLM backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDefinition {
    /// Model name as understood by the provider API.
    pub name: String,
    pub display_name: String,
    /// Name clients use to pick the model.
    pub alias: String,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub properties: ModelProperties,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelProperties {
    pub streaming: bool,
    pub temperature: f64,
    pub max_context_tokens: usize,
    pub system_prompt: Option<String>,
}

impl Default for ModelProperties {
    fn default() -> Self {
        Self {
            streaming: false,
            temperature: 1.0,
            max_context_tokens: 128_000,
            system_prompt: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ModelsConfigError {
    #[error("Failed to read models from {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse models from {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },

    #[error("Duplicate model alias '{0}'")]
    DuplicateAlias(String),
}

/// Load the model catalogue from `<config_path>/models.yaml` and fill in
/// missing system prompts from `<config_path>/prompts/<name>.md`.
///
/// A missing catalogue file is not an error: the service starts with no models.
pub fn load_models(config_path: &Path) -> Result<Vec<ModelDefinition>, ModelsConfigError> {
    let models_path = config_path.join(MODELS_CONFIG_FILENAME);
    let path_display = models_path.display().to_string();

    let raw = match fs::read_to_string(&models_path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::warn!(path = %path_display, "Models file not found, skipping");
            return Ok(Vec::new());
        }
        Err(source) => {
            return Err(ModelsConfigError::Io {
                path: path_display,
                source,
            })
        }
    };

    let mut models = parse_models(&raw).map_err(|source| ModelsConfigError::Parse {
        path: path_display.clone(),
        source,
    })?;
    tracing::info!(path = %path_display, count = models.len(), "Loaded models");

    let mut seen = std::collections::HashSet::new();
    for model in &models {
        if !seen.insert(model.alias.as_str()) {
            return Err(ModelsConfigError::DuplicateAlias(model.alias.clone()));
        }
    }

    let prompts_path = config_path.join(PROMPTS_FOLDER_NAME);
    for model in &mut models {
        let blank = model
            .properties
            .system_prompt
            .as_deref()
            .map_or(true, |p| p.trim().is_empty());
        if blank {
            model.properties.system_prompt = load_system_prompt(&prompts_path, &model.name);
        }
    }

    Ok(models)
}

/// Parse the YAML list of model definitions.
pub fn parse_models(raw: &str) -> Result<Vec<ModelDefinition>, serde_yaml::Error> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_yaml::from_str(raw)
}

fn load_system_prompt(prompts_path: &Path, model_name: &str) -> Option<String> {
    let path = prompts_path.join(format!("{model_name}.md"));
    match fs::read_to_string(&path) {
        Ok(prompt) => {
            tracing::info!(model = %model_name, "Loaded system prompt");
            Some(prompt)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::warn!(model = %model_name, "No system prompt found");
            None
        }
        Err(e) => {
            tracing::error!(model = %model_name, error = %e, "Failed to load system prompt");
            None
        }
    }
}
