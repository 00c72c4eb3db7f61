//! Configuration file parsing and resolution tests.

use conveyor_core::Error;
use conveyor_core::ids::*;
use conveyor_core::material::MaterialConfig;
use conveyor_core::pipeline::*;
use pretty_assertions::assert_eq;

const CONFIG: &str = r#"
version: "1"
environments:
  - name: uat
    pipelines: [deploy]
    variables:
      REGION: eu-west-1
      TIER: shared
agents:
  - hostname: build-01
    resources: [linux, jdk]
  - hostname: uat-01
    environments: [uat]
pipelines:
  - name: build
    label_template: "1.0-${COUNT}"
    materials:
      - type: git
        url: https://example.com/app.git
    stages:
      - name: compile
        jobs:
          - name: unit
            resources: [linux]
            run_instance_count: 3
          - name: smoke
            run_on_all_agents: true
      - name: package
        approval: manual
        jobs:
          - name: zip
  - name: deploy
    variables:
      TIER: dedicated
    timer:
      spec: "0 0 2 * * *"
    materials:
      - type: dependency
        pipeline: build
        stage: package
    stages:
      - name: release
        jobs:
          - name: push
"#;

#[test]
fn test_parse_and_resolve() {
    let loaded = ConfigFile::from_yaml(CONFIG).expect("valid config");
    let config = loaded.config;

    assert_eq!(config.pipelines.len(), 2);
    assert_eq!(config.agents.len(), 2);

    let build = config.pipeline(&PipelineName::new("BUILD")).expect("build pipeline");
    assert_eq!(build.label_template.as_str(), "1.0-${COUNT}");
    assert_eq!(build.environment, None);
    assert_eq!(build.stages[1].approval, Approval::Manual);

    let jobs = &build.stages[0].jobs;
    assert_eq!(jobs[0].fan_out(), FanOut::RunMultipleInstances(3));
    assert_eq!(jobs[1].fan_out(), FanOut::RunOnAllAgents);

    let deploy = config.pipeline(&PipelineName::new("deploy")).expect("deploy pipeline");
    assert_eq!(deploy.environment.as_deref(), Some("uat"));
    assert_eq!(deploy.variables.get("REGION"), Some("eu-west-1"));
    assert_eq!(deploy.variables.get("TIER"), Some("dedicated"));
    assert_eq!(deploy.materials[0], MaterialConfig::dependency("build", "package"));
    assert!(deploy.timer.is_some());
}

#[test]
fn test_fingerprint_tracks_contents() {
    let first = ConfigFile::from_yaml(CONFIG).expect("valid config");
    let again = ConfigFile::from_yaml(CONFIG).expect("valid config");
    let changed = ConfigFile::from_yaml(&CONFIG.replace("1.0-", "2.0-")).expect("valid config");

    assert_eq!(first.fingerprint, again.fingerprint);
    assert_ne!(first.fingerprint, changed.fingerprint);
    assert_eq!(first.fingerprint.len(), 64);
}

#[test]
fn test_duplicate_pipeline_rejected() {
    let yaml = r#"
pipelines:
  - name: app
    materials: [{ type: svn, url: "svn://repo" }]
    stages: [{ name: s, jobs: [{ name: j }] }]
  - name: APP
    materials: [{ type: svn, url: "svn://repo" }]
    stages: [{ name: s, jobs: [{ name: j }] }]
"#;
    assert!(matches!(ConfigFile::from_yaml(yaml), Err(Error::InvalidConfig(_))));
}

#[test]
fn test_pipeline_in_two_environments_rejected() {
    let yaml = r#"
environments:
  - name: a
    pipelines: [app]
  - name: b
    pipelines: [app]
pipelines:
  - name: app
    materials: [{ type: git, url: "https://example.com/app.git" }]
    stages: [{ name: s, jobs: [{ name: j }] }]
"#;
    assert!(matches!(ConfigFile::from_yaml(yaml), Err(Error::InvalidConfig(_))));
}

#[test]
fn test_malformed_yaml_is_serialization_error() {
    assert!(matches!(
        ConfigFile::from_yaml("pipelines: [ {"),
        Err(Error::Serialization(_))
    ));
}
