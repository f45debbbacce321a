//! Alias-keyed registry of configured chat models.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::models::{ModelDefinition, ModelProperties};
use crate::models::model_info::ModelInfo;
use crate::services::llm::{self, ChatModel};

struct Entry {
    client: Arc<dyn ChatModel>,
    properties: ModelProperties,
}

/// Chat clients and their properties, looked up by alias.
pub struct ModelRegistry {
    entries: HashMap<String, Entry>,
    catalogue: Vec<ModelInfo>,
}

impl ModelRegistry {
    /// Build one provider client per configured model.
    pub fn from_definitions(definitions: &[ModelDefinition], http: reqwest::Client) -> Self {
        let mut registry = Self::empty();
        for definition in definitions {
            let client = llm::build_chat_model(definition, http.clone());
            tracing::info!(
                alias = %definition.alias,
                model = %definition.name,
                provider = client.provider_name(),
                streaming = definition.properties.streaming,
                "Registered chat model"
            );
            registry.insert(
                &definition.alias,
                &definition.display_name,
                client,
                definition.properties.clone(),
            );
        }
        registry
    }

    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
            catalogue: Vec::new(),
        }
    }

    /// Register a client under `alias`, replacing any previous entry.
    pub fn insert(
        &mut self,
        alias: &str,
        display_name: &str,
        client: Arc<dyn ChatModel>,
        properties: ModelProperties,
    ) {
        self.catalogue.retain(|m| m.alias != alias);
        self.catalogue.push(ModelInfo {
            display_name: display_name.to_string(),
            alias: alias.to_string(),
        });
        self.entries
            .insert(alias.to_string(), Entry { client, properties });
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.entries.contains_key(alias)
    }

    pub fn client(&self, alias: &str) -> Option<Arc<dyn ChatModel>> {
        self.entries.get(alias).map(|e| Arc::clone(&e.client))
    }

    pub fn properties(&self, alias: &str) -> Option<&ModelProperties> {
        self.entries.get(alias).map(|e| &e.properties)
    }

    /// Display names and aliases in configuration order.
    pub fn catalogue(&self) -> &[ModelInfo] {
        &self.catalogue
    }
}
