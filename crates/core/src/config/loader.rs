//! Configuration file loader for the `.vacuum-dryer/` directory structure.
//!
//! This module provides functionality to load and parse all configuration files
//! from the `.vacuum-dryer/` directory, including:
//! - `config.toml`: Machine settings
//! - `recipes/*.json`, `*.toml`, `*.yaml`, `*.yml`: Process recipes
//!
//! It also reads and writes single recipe files for the persistence
//! collaborator and the CLI.

use crate::config::error::ConfigError;
use crate::config::error::ConfigResult;
use crate::config::models::{AppConfig, MachineConfig};
use std::path::{Path, PathBuf};
use tracing::debug;
use vd_protocol::recipe_models::ProcessRecipe;
use walkdir::WalkDir;

/// Name of the configuration directory under the root.
pub const CONFIG_DIR: &str = ".vacuum-dryer";

const RECIPE_EXTENSIONS: [&str; 4] = ["json", "toml", "yaml", "yml"];

/// Loads all configuration from the `.vacuum-dryer/` directory.
///
/// # Arguments
///
/// * `root` - Root directory containing the `.vacuum-dryer/` folder
///
/// # Returns
///
/// An `AppConfig` with the machine settings and every recipe found, sorted by
/// name. Missing directories or files produce the defaults rather than an
/// error.
///
/// # Errors
///
/// Returns `ConfigError` if:
/// - Files exist but cannot be read
/// - Files have invalid syntax (TOML, JSON or YAML)
/// - The machine settings or a recipe fail validation
/// - `default_recipe` names a recipe that does not exist
///
/// # Example
///
/// ```rust,no_run
/// use vd_core::config::loader::load_config;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new(".")).await?;
/// println!("Sync tolerance {}", config.machine.sync_tolerance);
/// # Ok(())
/// # }
/// ```
pub async fn load_config(root: &Path) -> ConfigResult<AppConfig> {
    let vd_dir = root.join(CONFIG_DIR);

    // If .vacuum-dryer doesn't exist, return default config
    if !vd_dir.exists() {
        return Ok(AppConfig::default());
    }

    let machine = load_machine_config(&vd_dir)?;
    let recipes = load_recipes(&vd_dir.join("recipes"))?;

    if let Some(name) = &machine.default_recipe {
        if !recipes.iter().any(|recipe| &recipe.name == name) {
            return Err(ConfigError::InvalidConfig {
                path: vd_dir.join("config.toml"),
                reason: format!("default_recipe '{name}' not found in recipes/"),
            });
        }
    }

    debug!(recipes = recipes.len(), "configuration loaded");
    Ok(AppConfig { machine, recipes })
}

/// Loads machine settings from `config.toml`.
fn load_machine_config(vd_dir: &Path) -> ConfigResult<MachineConfig> {
    let config_path = vd_dir.join("config.toml");

    // If config.toml doesn't exist, return default
    if !config_path.exists() {
        return Ok(MachineConfig::default());
    }

    let content = read(&config_path)?;
    let config: MachineConfig = toml::from_str(&content).map_err(|source| ConfigError::TomlParse {
        path: config_path.clone(),
        source,
    })?;

    let problems = config.validate();
    if !problems.is_empty() {
        return Err(ConfigError::InvalidConfig {
            path: config_path,
            reason: problems.join("; "),
        });
    }

    Ok(config)
}

/// Loads every recipe file directly inside `dir`, sorted by recipe name.
fn load_recipes(dir: &Path) -> ConfigResult<Vec<ProcessRecipe>> {
    // If recipes directory doesn't exist, return empty vector
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut recipes = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).into_iter() {
        let entry = entry.map_err(|source| ConfigError::DirectoryWalk {
            path: dir.to_path_buf(),
            source,
        })?;

        let path = entry.path();

        // Only process recipe documents
        let ext = path.extension().and_then(|s| s.to_str());
        if !ext.is_some_and(|ext| RECIPE_EXTENSIONS.contains(&ext)) {
            continue;
        }

        recipes.push(load_recipe_file(path)?);
    }

    recipes.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(recipes)
}

fn read(path: &Path) -> ConfigResult<String> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse one recipe document and validate it.
///
/// The format follows the extension: `.toml`, `.yaml`/`.yml`, anything else
/// is read as JSON. Unknown fields are ignored and missing fields take their
/// defaults.
pub fn load_recipe_file(path: &Path) -> ConfigResult<ProcessRecipe> {
    let recipe = parse_recipe_file(path)?;

    let problems = recipe.validate();
    if !problems.is_empty() {
        return Err(ConfigError::InvalidConfig {
            path: path.to_path_buf(),
            reason: problems.join("; "),
        });
    }

    Ok(recipe)
}

/// Parse one recipe document without validating its values.
pub fn parse_recipe_file(path: &Path) -> ConfigResult<ProcessRecipe> {
    let content = read(path)?;

    let recipe = match path.extension().and_then(|s| s.to_str()) {
        Some("toml") => toml::from_str(&content).map_err(|source| ConfigError::TomlParse {
            path: path.to_path_buf(),
            source,
        })?,
        Some("yaml") | Some("yml") => {
            serde_yaml::from_str(&content).map_err(|source| ConfigError::YamlParse {
                path: path.to_path_buf(),
                source,
            })?
        }
        _ => serde_json::from_str(&content).map_err(|source| ConfigError::JsonParse {
            path: path.to_path_buf(),
            source,
        })?,
    };
    Ok(recipe)
}

/// File name used for a recipe: its name with path-hostile characters
/// replaced, plus `.json`.
pub fn recipe_file_name(recipe: &ProcessRecipe) -> String {
    let stem: String = recipe
        .name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if stem.is_empty() {
        "recipe.json".to_string()
    } else {
        format!("{stem}.json")
    }
}

/// Write `recipe` as pretty JSON into `dir`, creating it if needed.
///
/// # Returns
///
/// The path of the written file.
pub fn save_recipe(dir: &Path, recipe: &ProcessRecipe) -> ConfigResult<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|source| ConfigError::FileWrite {
        path: dir.to_path_buf(),
        source,
    })?;

    let path = dir.join(recipe_file_name(recipe));
    let json = serde_json::to_string_pretty(recipe).map_err(|source| ConfigError::JsonParse {
        path: path.clone(),
        source,
    })?;
    std::fs::write(&path, json).map_err(|source| ConfigError::FileWrite {
        path: path.clone(),
        source,
    })?;

    debug!(path = %path.display(), "recipe saved");
    Ok(path)
}

/// Names of the recipes stored in `dir`, sorted.
pub fn list_recipes(dir: &Path) -> ConfigResult<Vec<String>> {
    Ok(load_recipes(dir)?.into_iter().map(|recipe| recipe.name).collect())
}
