use std::fs;
use std::path::Path;

use credit_risk_core::config::EngineConfig;
use tracing::debug;

use super::file::resolve_path;

/// Engine configuration from `--config` (YAML or JSON, by extension) with
/// `--model-dir` taking precedence over the file.
pub fn load_engine_config(
    path: Option<&str>,
    model_dir: Option<&str>,
) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let mut config = match path {
        Some(path) => read_config(&resolve_path(path)?)?,
        None => EngineConfig::default(),
    };
    if let Some(dir) = model_dir {
        config = config.with_model_dir(dir);
    }
    config.validate()?;
    debug!(
        source = path.unwrap_or("defaults"),
        model_dir = %config.model_dir.display(),
        "engine config loaded"
    );
    Ok(config)
}

fn read_config(path: &Path) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    if !is_yaml {
        return Ok(EngineConfig::load(path)?);
    }
    let contents = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?;
    let config: EngineConfig = serde_yaml::from_str(&contents)
        .map_err(|e| format!("Failed to parse '{}': {}", path.display(), e))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_yaml_config_with_override() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "model_dir: /tmp/from-file\nensemble:\n  seed: 9\n").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let config = load_engine_config(Some(&path), None).unwrap();
        assert_eq!(config.model_dir, Path::new("/tmp/from-file"));
        assert_eq!(config.ensemble.seed, 9);

        let config = load_engine_config(Some(&path), Some("/tmp/flag")).unwrap();
        assert_eq!(config.model_dir, Path::new("/tmp/flag"));
    }

    #[test]
    fn test_defaults_without_file() {
        assert_eq!(load_engine_config(None, None).unwrap(), EngineConfig::default());
    }
}
