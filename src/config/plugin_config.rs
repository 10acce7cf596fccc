//! Free-form per-plugin configuration.

// crates.io
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
// self
use crate::{
	_prelude::*,
	config::ConfigPaths,
	store::{ConfigPersistenceError, ConfigRepository, ConfigStore, DiskStore},
};

/// JSON object owned by one plugin, persisted with the same locking discipline as the core
/// configuration.
#[derive(Debug)]
pub struct PluginConfig {
	repository: ConfigRepository<Map<String, Value>>,
}
impl PluginConfig {
	/// Wraps a store; nothing is read until first access.
	pub fn new(store: Arc<dyn ConfigStore>) -> Self {
		Self { repository: ConfigRepository::new(store) }
	}

	/// Opens the document of plugin `name` under `paths`.
	pub fn open(paths: &ConfigPaths, name: &str) -> Self {
		Self::new(Arc::new(DiskStore::new(paths.plugin_config(name))))
	}

	/// Routes persistence failures to `handler`.
	pub fn with_error_handler<F>(self, handler: F) -> Self
	where
		F: 'static + Send + Sync + Fn(&ConfigPersistenceError),
	{
		Self { repository: self.repository.with_error_handler(handler) }
	}

	/// Raw value stored under `key`.
	pub fn get(&self, key: &str) -> Option<Value> {
		self.repository.read(|map| map.get(key).cloned())
	}

	/// Value stored under `key`, decoded as `T`.
	pub fn get_as<T>(&self, key: &str) -> Result<Option<T>, serde_json::Error>
	where
		T: DeserializeOwned,
	{
		self.get(key).map(serde_json::from_value).transpose()
	}

	/// Stores `value` under `key`. Encoding happens before the write, so a failure leaves
	/// the document untouched.
	pub fn set<V>(&self, key: impl Into<String>, value: &V) -> Result<(), serde_json::Error>
	where
		V: ?Sized + Serialize,
	{
		let key = key.into();
		let value = serde_json::to_value(value)?;

		self.repository.write(|map| map.insert(key, value));

		Ok(())
	}

	/// Removes `key`; returns whether it existed.
	pub fn erase(&self, key: &str) -> bool {
		self.repository.write(|map| map.remove(key).is_some())
	}

	/// Returns `true` when `key` is present.
	pub fn exists(&self, key: &str) -> bool {
		self.repository.read(|map| map.contains_key(key))
	}

	/// All keys, sorted.
	pub fn keys(&self) -> Vec<String> {
		let mut keys = self.repository.read(|map| map.keys().cloned().collect::<Vec<_>>());

		keys.sort();

		keys
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::store::MemoryStore;

	#[derive(Debug, PartialEq, Serialize, Deserialize)]
	struct Cluster {
		name: String,
		workers: u32,
	}

	#[test]
	fn typed_values_round_trip() {
		let store = MemoryStore::default();
		let config = PluginConfig::new(Arc::new(store.clone()));
		let cluster = Cluster { name: "dev".into(), workers: 3 };

		config.set("cluster", &cluster).expect("Cluster should encode.");
		config.set("region", "us-south").expect("Region should encode.");

		assert_eq!(config.get_as::<Cluster>("cluster").expect("Cluster should decode."), Some(cluster));
		assert_eq!(config.get("region"), Some(Value::from("us-south")));
		assert_eq!(config.keys(), vec!["cluster".to_owned(), "region".to_owned()]);
		assert!(config.get_as::<u32>("region").is_err());
		assert_eq!(config.get_as::<u32>("missing").expect("Missing key should decode."), None);
	}

	#[test]
	fn erase_reports_presence() {
		let store = MemoryStore::with_contents(r#"{"token":"abc"}"#);
		let config = PluginConfig::new(Arc::new(store.clone()));

		assert!(config.exists("token"));
		assert!(config.erase("token"));
		assert!(!config.erase("token"));
		assert!(!config.exists("token"));
		assert_eq!(store.contents(), Some(b"{}".to_vec()));
	}
}
