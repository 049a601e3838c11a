use crate::config::schema::{FetchConfig, OutputConfig};
use crate::error::{Error, Result};
use crate::output::{
    OutputHandler, console::ConsoleOutput, csv::CsvOutput, discard::DiscardOutput,
    file::FileOutput, jsonl::JsonlOutput,
};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use validator::Validate;

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<FetchConfig> {
        let path = path.as_ref();
        let mut visited = HashSet::new();
        Self::load_with_inheritance(path, &mut visited, false)
    }

    fn load_with_inheritance(
        path: &Path,
        visited: &mut HashSet<PathBuf>,
        is_parent_load: bool,
    ) -> Result<FetchConfig> {
        let path = fs::canonicalize(path).map_err(|e| {
            Error::Config(format!("{}: {}", path.display(), e))
        })?;

        if visited.contains(&path) {
            return Err(Error::Config(format!(
                "Circular inheritance detected involving {}",
                path.display()
            )));
        }
        visited.insert(path.clone());

        let config = Self::load_file(&path)?;

        let final_config = if let Some(parent_path_str) = &config.extends {
            let parent_path = path.parent()
                .ok_or_else(|| Error::Config(format!(
                    "Cannot determine parent directory for {}",
                    path.display()
                )))?
                .join(parent_path_str);

            let parent_config = Self::load_with_inheritance(&parent_path, visited, true)?;
            Self::merge_configs(parent_config, config)
        } else {
            config
        };

        if !is_parent_load {
            final_config.validate()?;
        }

        Ok(final_config)
    }

    fn load_file(path: &Path) -> Result<FetchConfig> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some("yaml") | Some("yml") => Ok(serde_yaml::from_str(&content)?),
            Some("toml") => Ok(toml::from_str(&content)?),
            _ => Err(Error::Config(format!(
                "Unsupported file extension: {}",
                path.display()
            ))),
        }
    }

    fn merge_configs(mut parent: FetchConfig, child: FetchConfig) -> FetchConfig {
        if !child.name.is_empty() {
            parent.name = child.name;
        }
        // The address source is replaced as a whole.
        if child.list_url.is_some() || !child.addresses.is_empty() {
            parent.list_url = child.list_url;
            parent.addresses = child.addresses;
        }
        if child.deadline_ms.is_some() {
            parent.deadline_ms = child.deadline_ms;
        }
        if child.request_timeout_ms.is_some() {
            parent.request_timeout_ms = child.request_timeout_ms;
        }
        if child.user_agent.is_some() {
            parent.user_agent = child.user_agent;
        }
        if child.output.is_some() {
            parent.output = child.output;
        }

        parent.extends = None;
        parent
    }

    pub fn create_output(
        config: &FetchConfig,
        multi: Option<Arc<indicatif::MultiProgress>>,
    ) -> Result<Box<dyn OutputHandler>> {
        let handler: Box<dyn OutputHandler> = match &config.output {
            None | Some(OutputConfig::Console) => Box::new(ConsoleOutput::new(multi)),
            Some(OutputConfig::Discard) => Box::new(DiscardOutput),
            Some(OutputConfig::File { path }) => Box::new(FileOutput::new(PathBuf::from(path))?),
            Some(OutputConfig::Jsonl { path }) => Box::new(JsonlOutput::new(PathBuf::from(path))?),
            Some(OutputConfig::Csv { path }) => Box::new(CsvOutput::new(PathBuf::from(path))?),
        };
        Ok(handler)
    }
}
