//! `reaperd --check` specs
//!
//! Check mode validates the config file and exits without contacting any
//! cluster.

use crate::prelude::*;

const VALID: &str = r#"
[reaper]
image_pull_backoff_limit = 4

[[cloud]]
name = "k8s"
namespace = "jenkins"
pod_retention = "on-failure"

[[cloud]]
name = "gpu"
server_url = "https://gpu.example:6443"

[[agent]]
name = "node-1"
cloud = "k8s"
"#;

#[test]
fn valid_config_prints_summary() {
    let project = Project::empty();
    let config = project.file("reaper.toml", VALID);

    reaperd()
        .check(&config)
        .passes()
        .stdout_has("reaper.toml: ok")
        .stdout_has("2 cloud(s) [k8s, gpu], 1 agent(s), image pull back-off limit 4");
}

#[test]
fn config_path_comes_from_environment() {
    let project = Project::empty();
    let config = project.file("custom.toml", VALID);

    reaperd().args(&["--check"]).env("REAPER_CONFIG", &config).passes().stdout_has("custom.toml: ok");
}

#[test]
fn config_path_defaults_to_xdg_config_home() {
    let project = Project::empty();
    project.file("reaper/reaper.toml", VALID);

    reaperd()
        .args(&["--check"])
        .env("XDG_CONFIG_HOME", project.path())
        .passes()
        .stdout_has("reaper/reaper.toml: ok");
}

#[test]
fn environment_overrides_backoff_limit() {
    let project = Project::empty();
    let config = project.file("reaper.toml", VALID);

    reaperd()
        .check(&config)
        .env("REAPER_IMAGE_PULL_BACKOFF_LIMIT", "7")
        .passes()
        .stdout_has("image pull back-off limit 7");
}

#[test]
fn empty_config_is_valid() {
    let project = Project::empty();
    let config = project.file("reaper.toml", "");

    reaperd().check(&config).passes().stdout_has("0 cloud(s) [], 0 agent(s)");
}

#[test]
fn duplicate_cloud_is_rejected() {
    let project = Project::empty();
    let config = project.file("reaper.toml", "[[cloud]]\nname = \"k8s\"\n\n[[cloud]]\nname = \"k8s\"\n");

    reaperd().check(&config).fails().stderr_has("duplicate cloud 'k8s'");
}

#[test]
fn agent_on_unknown_cloud_is_rejected() {
    let project = Project::empty();
    let config = project.file("reaper.toml", "[[agent]]\nname = \"node-1\"\ncloud = \"nope\"\n");

    reaperd().check(&config).fails().stderr_has("unknown cloud 'nope'");
}

#[test]
fn malformed_toml_is_a_parse_error() {
    let project = Project::empty();
    let config = project.file("reaper.toml", "[[cloud]\nname = \"k8s\"\n");

    reaperd().check(&config).fails().stderr_has("failed to parse");
}

#[test]
fn missing_config_is_a_read_error() {
    let project = Project::empty();
    let config = project.path().join("absent.toml");

    reaperd().check(&config).fails().stderr_has("failed to read").stderr_has("absent.toml");
}
