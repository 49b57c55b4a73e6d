//! Option file for `--config`.

use lazyflow_compiler::CompileOptions;
use lazyflow_optimizer::OptimizeOptions;
use lazyflow_vm::VmOptions;
use serde::Deserialize;
use std::fs;

/// Every tunable of a run. Missing sections and fields take their
/// defaults; command-line flags are applied on top.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct Config {
    pub compile: CompileOptions,
    pub optimize: OptimizeOptions,
    pub vm: VmOptions,
}

impl Config {
    /// Parse a config from JSON text.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Read a config file. Errors are reported and mapped to exit code 1.
    pub fn load(path: &str) -> Result<Self, i32> {
        let text = fs::read_to_string(path).map_err(|e| {
            eprintln!("error: cannot read '{path}': {e}");
            1
        })?;
        Self::from_json(&text).map_err(|e| {
            eprintln!("error: invalid config '{path}': {e}");
            1
        })
    }
}
