// Assembler configuration (JSON config)
// Optional tuning file; every field has a default so a missing or partial
// file behaves like the stock tool.

use std::path::Path;

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssemblerConfig {
    /// Leaf size of the per-map spawn tree
    #[serde(default = "default_map_leaf_size")]
    pub map_leaf_size: u32,
    /// Leaf size of the per-model group tree
    #[serde(default = "default_group_leaf_size")]
    pub group_leaf_size: u32,
    /// Leaf size of the per-group triangle tree
    #[serde(default = "default_mesh_leaf_size")]
    pub mesh_leaf_size: u32,
    /// Upper bound accepted for name length fields in input files
    #[serde(default = "default_max_name_length")]
    pub max_name_length: u32,
}

fn default_map_leaf_size() -> u32 {
    3
}
fn default_group_leaf_size() -> u32 {
    1
}
fn default_mesh_leaf_size() -> u32 {
    3
}
fn default_max_name_length() -> u32 {
    500
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            map_leaf_size: default_map_leaf_size(),
            group_leaf_size: default_group_leaf_size(),
            mesh_leaf_size: default_mesh_leaf_size(),
            max_name_length: default_max_name_length(),
        }
    }
}

impl AssemblerConfig {
    /// Load from a JSON file. An absent file means defaults; a malformed
    /// one is logged and ignored.
    pub fn load(path: &Path) -> Self {
        let Ok(text) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        match serde_json::from_str(&text) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!("Ignoring malformed config {}: {}", path.display(), err);
                Self::default()
            }
        }
    }
}
