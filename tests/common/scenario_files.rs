//! Scenario and config files for binary tests

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

/// A temporary data directory holding a scenario file
pub struct ScenarioDir {
    pub dir: TempDir,
    pub scenario: PathBuf,
}

impl ScenarioDir {
    pub fn new(contents: &str) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let scenario = dir.path().join("scenario.toml");
        fs::write(&scenario, contents).expect("Failed to write scenario");
        Self { dir, scenario }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.dir.path().join("data")
    }

    /// Write a config file next to the scenario and return its path
    pub fn write_config(&self, contents: &str) -> PathBuf {
        let path = self.dir.path().join("config.toml");
        fs::write(&path, contents).expect("Failed to write config");
        path
    }
}

pub const SLIDER_SCENARIO: &str = r#"
magic = "%block slider --timeout 5"
blocking_code = "print waiting for slider"

[[controls]]
kind = "value"
name = "slider"
value = 0

[[cells]]
code = "print replayed cell"

[[events]]
after_ticks = 2
control = "slider"
set = 7
"#;

pub const INTERRUPT_SCENARIO: &str = r#"
magic = "%block go"

[[controls]]
kind = "button"
name = "go"

[[cells]]
code = "print never"

[[events]]
after_ticks = 1
interrupt = true
"#;
