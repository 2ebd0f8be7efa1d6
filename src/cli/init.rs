//! `careflow-server init`: write a starter configuration.

use super::output::Output;
use crate::utils::toml_config::DEFAULT_CONFIG_TEMPLATE;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "careflow.toml";

/// Result of the init operation
#[derive(Debug, PartialEq)]
pub enum InitResult {
    Success,
    /// careflow.toml exists and `--force` was not given
    AlreadyExists,
    Error(String),
}

pub struct InitConfig {
    pub path: PathBuf,
    pub force: bool,
}

pub fn run(config: InitConfig, output: &Output) -> InitResult {
    output.banner();
    output.header("Initializing Careflow");

    let base_path = &config.path;
    if !base_path.exists() {
        if let Err(e) = fs::create_dir_all(base_path) {
            output.error(&format!("Failed to create {}: {}", base_path.display(), e));
            return InitResult::Error(e.to_string());
        }
    }

    let config_path = base_path.join(CONFIG_FILE_NAME);
    if config_path.exists() && !config.force {
        output.warning(&format!("{} already exists!", CONFIG_FILE_NAME));
        output.hint("Use --force to overwrite existing files");
        return InitResult::AlreadyExists;
    }

    if let Err(e) = fs::write(&config_path, DEFAULT_CONFIG_TEMPLATE) {
        output.error(&format!("Failed to create {}: {}", CONFIG_FILE_NAME, e));
        return InitResult::Error(e.to_string());
    }
    output.created("config", CONFIG_FILE_NAME);

    let env_path = base_path.join(".env.example");
    match write_if_absent(&env_path, ENV_EXAMPLE, config.force) {
        Ok(true) => output.created("env", ".env.example"),
        Ok(false) => output.skipped(".env.example", "already exists"),
        Err(e) => output.warning(&format!("Failed to create .env.example: {}", e)),
    }

    output.success("Project initialized");
    output.header("Next Steps");
    output.info("Start Ollama, or switch [llm.provider] to openai:");
    output.command("ollama pull llama3.2");
    output.info("Start the server:");
    output.command("careflow-server");
    output.hint("Without a reachable model, free-text chat answers with the offline reply");

    InitResult::Success
}

/// Returns `Ok(false)` when the file exists and was left alone.
fn write_if_absent(path: &Path, content: &str, force: bool) -> std::io::Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }
    fs::write(path, content)?;
    Ok(true)
}

const ENV_EXAMPLE: &str = r#"# Careflow environment variables
# Copy to .env and fill in what you need.

# Logging (overrides [server].log_level)
RUST_LOG=info,careflow=debug

# Only needed with [llm.provider] type = "openai"
# OPENAI_API_KEY=sk-...
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::toml_config::CareflowConfig;

    fn init(path: &Path, force: bool) -> InitResult {
        run(
            InitConfig {
                path: path.to_path_buf(),
                force,
            },
            &Output::no_color(),
        )
    }

    #[test]
    fn test_init_writes_loadable_config() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(init(dir.path(), false), InitResult::Success);

        let config = CareflowConfig::load(dir.path().join(CONFIG_FILE_NAME)).unwrap();
        assert_eq!(config.server.port, 3000);
        assert!(dir.path().join(".env.example").exists());
    }

    #[test]
    fn test_init_refuses_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&config_path, "# mine").unwrap();

        assert_eq!(init(dir.path(), false), InitResult::AlreadyExists);
        assert_eq!(fs::read_to_string(&config_path).unwrap(), "# mine");

        assert_eq!(init(dir.path(), true), InitResult::Success);
        assert_ne!(fs::read_to_string(&config_path).unwrap(), "# mine");
    }

    #[test]
    fn test_init_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("site");
        assert_eq!(init(&nested, false), InitResult::Success);
        assert!(nested.join(CONFIG_FILE_NAME).exists());
    }
}
