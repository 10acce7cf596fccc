//! On-disk layout of the configuration directory.

// std
use std::path::{Path, PathBuf};

/// Directory created under the user (or overridden CLI) home.
pub const CONFIG_DIR_NAME: &str = ".bluemix";
/// File name shared by the core and per-plugin documents.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Locations of every configuration document, derived from one root directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigPaths {
	root: PathBuf,
}
impl ConfigPaths {
	/// Uses `root` as the configuration directory as-is.
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	/// Resolves `<home>/.bluemix`, preferring an explicit CLI home over the user home.
	pub fn resolve(cli_home: Option<&Path>, user_home: &Path) -> Self {
		let home = cli_home.filter(|path| !path.as_os_str().is_empty()).unwrap_or(user_home);

		Self::new(home.join(CONFIG_DIR_NAME))
	}

	/// Configuration directory.
	pub fn root(&self) -> &Path {
		&self.root
	}

	/// Core configuration document.
	pub fn core_config(&self) -> PathBuf {
		self.root.join(CONFIG_FILE_NAME)
	}

	/// Directory holding one subdirectory per plugin.
	pub fn plugins_dir(&self) -> PathBuf {
		self.root.join("plugins")
	}

	/// Configuration document of plugin `name`.
	pub fn plugin_config(&self, name: &str) -> PathBuf {
		self.plugins_dir().join(name).join(CONFIG_FILE_NAME)
	}
}
