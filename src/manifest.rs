// Versioned CDN manifest — advisory bundle file listing plus build metadata.

use std::collections::HashMap;

use serde::Deserialize;

/// Manifest document served at `{manifest_base_url}/{version}/manifest.json`.
///
/// The manifest is advisory: it names the bundle files for this build, but a
/// missing or unparseable manifest only means the loader falls back to the
/// default file names.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BundleManifest {
    /// Bundle key ("core", "plugins") to file name. Some builds publish the
    /// map under `assets` instead of `files`.
    #[serde(default, alias = "assets")]
    pub files: HashMap<String, String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default, alias = "buildHash")]
    pub build_hash: Option<String>,
}

impl BundleManifest {
    /// File name for a bundle key, if the manifest lists one.
    pub fn bundle_file(&self, key: &str) -> Option<&str> {
        self.files.get(key).map(String::as_str)
    }
}
