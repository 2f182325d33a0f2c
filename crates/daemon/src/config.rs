// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration file.
//!
//! One TOML file describes the engine tunables, the configured clouds, the
//! pod templates and the agents known at startup. [`Settings::load`] reads
//! and validates it into the types the engine consumes.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use reaper_adapters::WatchSettings;
use reaper_core::{AgentRecord, Cloud, PodRef, PodRetention, PodTemplateRef};
use reaper_engine::ReaperConfig;
use serde::Deserialize;
use thiserror::Error;

/// Errors from loading the config file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    #[serde(default)]
    reaper: ReaperSection,
    #[serde(default, rename = "cloud")]
    clouds: Vec<CloudSection>,
    #[serde(default, rename = "template")]
    templates: Vec<TemplateSection>,
    #[serde(default, rename = "agent")]
    agents: Vec<AgentSection>,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ReaperSection {
    image_pull_backoff_limit: u32,
    unknown_phase_grace_secs: u64,
    tally_ttl_secs: u64,
    reasons_ttl_secs: u64,
    watch_timeout_secs: u32,
    retry_backoff_max_ms: u64,
    retry_attempts: u32,
}

impl Default for ReaperSection {
    fn default() -> Self {
        let engine = ReaperConfig::default();
        let watch = WatchSettings::default();
        Self {
            image_pull_backoff_limit: engine.image_pull_backoff_limit,
            unknown_phase_grace_secs: engine.unknown_phase_grace.as_secs(),
            tally_ttl_secs: engine.tally_ttl.as_secs(),
            reasons_ttl_secs: engine.reasons_ttl.as_secs(),
            watch_timeout_secs: watch.timeout_secs,
            retry_backoff_max_ms: watch.retry_backoff_max.as_millis() as u64,
            retry_attempts: watch.retry_attempts,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CloudSection {
    name: String,
    server_url: Option<String>,
    namespace: Option<String>,
    #[serde(default)]
    skip_tls_verify: bool,
    server_certificate: Option<String>,
    token: Option<String>,
    #[serde(default)]
    pod_retention: PodRetention,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TemplateSection {
    name: String,
    image_pull_backoff_limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AgentSection {
    name: String,
    cloud: String,
    namespace: Option<String>,
    pod: Option<String>,
    template: Option<String>,
}

/// Validated daemon configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub engine: ReaperConfig,
    pub watch: WatchSettings,
    pub clouds: Vec<Cloud>,
    pub agents: Vec<AgentRecord>,
}

impl Settings {
    /// Read, parse and validate the config file at `path`.
    ///
    /// `REAPER_IMAGE_PULL_BACKOFF_LIMIT` overrides the file's limit.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let mut file: FileConfig = toml::from_str(&text)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
        if let Some(limit) = crate::env::image_pull_backoff_limit() {
            file.reaper.image_pull_backoff_limit = limit;
        }
        Self::from_file(file)
    }

    /// Parse and validate config text without touching the environment.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let file: FileConfig = toml::from_str(text)
            .map_err(|source| ConfigError::Parse { path: PathBuf::from("<inline>"), source })?;
        Self::from_file(file)
    }

    fn from_file(file: FileConfig) -> Result<Self, ConfigError> {
        let FileConfig { reaper, clouds, templates, agents } = file;
        if reaper.image_pull_backoff_limit < 1 {
            return Err(ConfigError::Invalid("image_pull_backoff_limit must be at least 1".into()));
        }

        let engine = ReaperConfig::default()
            .image_pull_backoff_limit(reaper.image_pull_backoff_limit)
            .unknown_phase_grace(Duration::from_secs(reaper.unknown_phase_grace_secs))
            .tally_ttl(Duration::from_secs(reaper.tally_ttl_secs))
            .reasons_ttl(Duration::from_secs(reaper.reasons_ttl_secs));
        let watch = WatchSettings {
            timeout_secs: reaper.watch_timeout_secs,
            retry_backoff_max: Duration::from_millis(reaper.retry_backoff_max_ms),
            retry_attempts: reaper.retry_attempts,
        };

        let clouds = build_clouds(clouds)?;
        let templates = build_templates(templates)?;
        let agents = build_agents(agents, &clouds, &templates)?;
        Ok(Self { engine, watch, clouds, agents })
    }
}

fn build_clouds(sections: Vec<CloudSection>) -> Result<Vec<Cloud>, ConfigError> {
    let mut seen = HashSet::new();
    let mut clouds = Vec::with_capacity(sections.len());
    for section in sections {
        if section.name.trim().is_empty() {
            return Err(ConfigError::Invalid("cloud name must not be empty".into()));
        }
        if !seen.insert(section.name.clone()) {
            return Err(ConfigError::Invalid(format!("duplicate cloud '{}'", section.name)));
        }
        let mut cloud = Cloud::new(section.name)
            .skip_tls_verify(section.skip_tls_verify)
            .pod_retention(section.pod_retention);
        cloud.server_url = section.server_url;
        cloud.namespace = section.namespace.filter(|ns| !ns.is_empty());
        cloud.server_certificate = section.server_certificate;
        cloud.token = section.token;
        clouds.push(cloud);
    }
    Ok(clouds)
}

fn build_templates(
    sections: Vec<TemplateSection>,
) -> Result<HashMap<String, PodTemplateRef>, ConfigError> {
    let mut templates = HashMap::new();
    for section in sections {
        if section.image_pull_backoff_limit == Some(0) {
            return Err(ConfigError::Invalid(format!(
                "template '{}': image_pull_backoff_limit must be at least 1",
                section.name
            )));
        }
        let template = PodTemplateRef {
            name: section.name.clone(),
            image_pull_backoff_limit: section.image_pull_backoff_limit,
        };
        if templates.insert(section.name.clone(), template).is_some() {
            return Err(ConfigError::Invalid(format!("duplicate template '{}'", section.name)));
        }
    }
    Ok(templates)
}

fn build_agents(
    sections: Vec<AgentSection>,
    clouds: &[Cloud],
    templates: &HashMap<String, PodTemplateRef>,
) -> Result<Vec<AgentRecord>, ConfigError> {
    let mut names = HashSet::new();
    let mut pods: HashMap<PodRef, String> = HashMap::new();
    let mut agents = Vec::with_capacity(sections.len());
    for section in sections {
        let Some(cloud) = clouds.iter().find(|c| c.name() == section.cloud) else {
            return Err(ConfigError::Invalid(format!(
                "agent '{}' references unknown cloud '{}'",
                section.name, section.cloud
            )));
        };
        if !names.insert(section.name.clone()) {
            return Err(ConfigError::Invalid(format!("duplicate agent '{}'", section.name)));
        }
        let namespace = section.namespace.unwrap_or_else(|| cloud.pod_namespace().to_string());
        let pod = PodRef::new(namespace, section.pod.unwrap_or_else(|| section.name.clone()));
        if let Some(owner) = pods.insert(pod.clone(), section.name.clone()) {
            return Err(ConfigError::Invalid(format!(
                "agents '{}' and '{}' share pod {}",
                owner, section.name, pod
            )));
        }

        let mut agent = AgentRecord::new(section.name, section.cloud, pod);
        if let Some(name) = section.template {
            let template = templates.get(&name).cloned().unwrap_or_else(|| PodTemplateRef::new(name));
            agent = agent.with_template(template);
        }
        agents.push(agent);
    }
    Ok(agents)
}

/// One-line description of the loaded settings, for `--check` and startup logs.
pub fn summary(settings: &Settings) -> String {
    let clouds: Vec<&str> = settings.clouds.iter().map(Cloud::name).collect();
    format!(
        "{} cloud(s) [{}], {} agent(s), image pull back-off limit {}",
        clouds.len(),
        clouds.join(", "),
        settings.agents.len(),
        settings.engine.image_pull_backoff_limit
    )
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
