use log::{info, warn};
use std::collections::HashMap;
use std::path::Path;

use super::{Scenario, ScenarioError};

/// scenarios loaded from `<name>.json` files, looked up by name
#[derive(Debug, Clone, Default)]
pub struct ScenarioStore {
    scenarios: HashMap<String, Scenario>,
}

impl ScenarioStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// a broken file is skipped with a warning so one typo does not take the bot down
    pub fn load_dir(dir: &Path) -> Result<Self, ScenarioError> {
        let mut store = Self::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };

            let content = std::fs::read_to_string(&path)?;
            match Self::parse(&content) {
                Ok(scenario) => {
                    store.insert(name, scenario);
                }
                Err(e) => warn!("Skipping scenario {}: {}", path.display(), e),
            }
        }
        info!("Loaded {} scenarios from {}", store.len(), dir.display());
        Ok(store)
    }

    pub fn parse(json: &str) -> Result<Scenario, ScenarioError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn insert(&mut self, name: &str, scenario: Scenario) {
        self.scenarios.insert(name.to_string(), scenario);
    }

    pub fn get(&self, name: &str) -> Option<&Scenario> {
        self.scenarios.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.scenarios.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}
