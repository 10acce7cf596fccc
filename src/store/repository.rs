//! Lazily loaded configuration record shared by every component of one process.

// crates.io
use parking_lot::RwLockWriteGuard;
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	store::{ConfigPersistenceError, ConfigStore, StoreLock},
};

/// Records a [`ConfigRepository`] can hold: serde round-trippable with a seeding default.
pub trait ConfigData
where
	Self: 'static + Send + Sync + Default + Serialize + DeserializeOwned,
{
}
impl<T> ConfigData for T where T: 'static + Send + Sync + Default + Serialize + DeserializeOwned {}

/// Callback receiving persistence failures.
pub type ErrorHandler = Arc<dyn Fn(&ConfigPersistenceError) + Send + Sync>;

/// Disk-backed record guarded by an in-process read/write lock and the store's advisory lock.
///
/// - The record is loaded on first access, exactly once; later reads never touch the store.
/// - A missing or unreadable-but-not-forbidden document is replaced by `T::default()`, which
///   is persisted immediately so other processes see the same seeded state. Seeding re-reads
///   the document under the advisory lock first, so a missing file costs two loads and one
///   save on first access and nothing afterwards.
/// - Every [`write`](Self::write) re-reads the document under the advisory lock, applies the
///   mutation, and persists the whole record before releasing both locks.
/// - Accessors never return persistence errors; they are delivered to the error handler.
pub struct ConfigRepository<T>
where
	T: ConfigData,
{
	store: Arc<dyn ConfigStore>,
	state: RwLock<Slot<T>>,
	on_error: ErrorHandler,
}
impl<T> ConfigRepository<T>
where
	T: ConfigData,
{
	/// Creates a repository over `store`; nothing is read until the first access.
	pub fn new(store: Arc<dyn ConfigStore>) -> Self {
		Self {
			store,
			state: RwLock::new(Slot { data: T::default(), loaded: false }),
			on_error: Arc::new(log_persistence_error),
		}
	}

	/// Replaces the persistence error handler.
	pub fn with_error_handler<F>(mut self, handler: F) -> Self
	where
		F: 'static + Send + Sync + Fn(&ConfigPersistenceError),
	{
		self.on_error = Arc::new(handler);

		self
	}

	/// Backing store.
	pub fn store(&self) -> &Arc<dyn ConfigStore> {
		&self.store
	}

	/// Runs `f` against the record under the shared lock, loading it first if needed.
	pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
		{
			let slot = self.state.read();

			if slot.loaded {
				return f(&slot.data);
			}
		}

		let mut slot = self.state.write();

		self.ensure_loaded(&mut slot);

		let slot = RwLockWriteGuard::downgrade(slot);

		f(&slot.data)
	}

	/// Applies `f` to the latest record and persists the result.
	///
	/// If the advisory lock cannot be taken the mutation still applies to the in-memory
	/// record, and the failure goes to the error handler.
	pub fn write<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
		let mut slot = self.state.write();

		self.ensure_loaded(&mut slot);

		let lock = match self.store.lock() {
			Ok(lock) => lock,
			Err(e) => {
				let output = f(&mut slot.data);

				self.report(&e);

				return output;
			},
		};

		if let Some(latest) = self.load_latest() {
			slot.data = latest;
		}

		let output = f(&mut slot.data);

		self.persist(&lock, &slot.data);

		output
	}

	/// Returns a clone of the whole record.
	pub fn snapshot(&self) -> T
	where
		T: Clone,
	{
		self.read(T::clone)
	}

	fn ensure_loaded(&self, slot: &mut Slot<T>) {
		if slot.loaded {
			return;
		}

		slot.loaded = true;

		match self.store.load() {
			Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
				Ok(data) => {
					slot.data = data;

					return;
				},
				Err(_e) => {
					#[cfg(feature = "tracing")]
					tracing::debug!(location = %self.store.location(), error = %_e, "Discarding unparsable configuration.");
				},
			},
			Ok(None) => (),
			Err(e @ ConfigPersistenceError::PermissionDenied { .. }) => {
				self.report(&e);

				return;
			},
			Err(_e) => {
				#[cfg(feature = "tracing")]
				tracing::debug!(location = %self.store.location(), error = %_e, "Treating unreadable configuration as empty.");
			},
		}

		self.seed(slot);
	}

	fn seed(&self, slot: &mut Slot<T>) {
		slot.data = T::default();

		let lock = match self.store.lock() {
			Ok(lock) => lock,
			Err(e) => {
				self.report(&e);

				return;
			},
		};

		// Another process may have seeded the file since the unlocked load.
		if let Some(latest) = self.load_latest() {
			slot.data = latest;

			return;
		}

		self.persist(&lock, &slot.data);
	}

	fn load_latest(&self) -> Option<T> {
		match self.store.load() {
			Ok(Some(bytes)) => serde_json::from_slice(&bytes).ok(),
			Ok(None) => None,
			Err(e) => {
				self.report(&e);

				None
			},
		}
	}

	fn persist(&self, lock: &StoreLock, data: &T) {
		let bytes = match serde_json::to_vec_pretty(data) {
			Ok(bytes) => bytes,
			Err(source) => {
				self.report(&ConfigPersistenceError::Encode { location: self.store.location(), source });

				return;
			},
		};

		if let Err(e) = self.store.save(lock, &bytes) {
			self.report(&e);
		}
	}

	fn report(&self, error: &ConfigPersistenceError) {
		(self.on_error)(error);
	}
}
impl<T> Debug for ConfigRepository<T>
where
	T: ConfigData,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ConfigRepository")
			.field("location", &self.store.location())
			.field("loaded", &self.state.read().loaded)
			.finish_non_exhaustive()
	}
}

struct Slot<T> {
	data: T,
	loaded: bool,
}

fn log_persistence_error(_error: &ConfigPersistenceError) {
	#[cfg(feature = "tracing")]
	tracing::warn!(location = %_error.location(), error = %_error, "Configuration persistence failed.");
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;
	use crate::store::MemoryStore;

	#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
	struct Counter {
		value: u32,
	}
	impl Default for Counter {
		fn default() -> Self {
			Self { value: 7 }
		}
	}

	fn repository(store: &MemoryStore) -> ConfigRepository<Counter> {
		ConfigRepository::new(Arc::new(store.clone()))
	}

	#[test]
	fn first_read_seeds_and_persists_default() {
		let store = MemoryStore::default();
		let repo = repository(&store);

		assert_eq!(repo.read(|c| c.value), 7);
		assert_eq!(store.saves(), 1);
		assert_eq!(
			serde_json::from_slice::<Counter>(&store.contents().expect("Seed should be persisted."))
				.expect("Seed should parse."),
			Counter { value: 7 }
		);
	}

	#[test]
	fn missing_document_is_rechecked_under_lock_once() {
		let store = MemoryStore::default();
		let repo = repository(&store);

		repo.read(|c| c.value);
		repo.read(|c| c.value);

		assert_eq!(store.loads(), 2);
		assert_eq!(store.saves(), 1);
	}

	#[test]
	fn present_document_is_loaded_once() {
		let store = MemoryStore::with_contents(r#"{"value":3}"#);
		let repo = repository(&store);

		assert_eq!(repo.read(|c| c.value), 3);
		assert_eq!(repo.read(|c| c.value), 3);
		assert_eq!(store.loads(), 1);
		assert_eq!(store.saves(), 0);
	}

	#[test]
	fn corrupt_document_is_replaced_by_default() {
		let store = MemoryStore::with_contents("{not json");
		let repo = repository(&store);

		assert_eq!(repo.read(|c| c.value), 7);
		assert_eq!(store.saves(), 1);
	}

	#[test]
	fn write_adopts_concurrent_external_changes() {
		let store = MemoryStore::with_contents(r#"{"value":1}"#);
		let repo = repository(&store);

		assert_eq!(repo.read(|c| c.value), 1);

		store.set_contents(r#"{"value":10}"#);

		assert_eq!(repo.write(|c| { c.value += 1; c.value }), 11);
		assert_eq!(repo.read(|c| c.value), 11);
		assert!(!store.is_locked());
	}

	#[test]
	fn lock_failure_reaches_handler_and_keeps_memory_change() {
		let store = MemoryStore::with_contents(r#"{"value":1}"#);
		let failures = Arc::new(AtomicUsize::new(0));
		let seen = failures.clone();
		let repo = repository(&store).with_error_handler(move |e| {
			assert!(matches!(e, ConfigPersistenceError::Lock { .. }));

			seen.fetch_add(1, Ordering::SeqCst);
		});

		store.fail_locks(true);
		repo.write(|c| c.value = 2);

		assert_eq!(failures.load(Ordering::SeqCst), 1);
		assert_eq!(repo.read(|c| c.value), 2);
		assert_eq!(store.saves(), 0);
	}

	#[test]
	fn permission_denied_skips_seeding() {
		let store = MemoryStore::with_contents(r#"{"value":1}"#);
		let failures = Arc::new(AtomicUsize::new(0));
		let seen = failures.clone();
		let repo = repository(&store).with_error_handler(move |e| {
			assert!(matches!(e, ConfigPersistenceError::PermissionDenied { .. }));

			seen.fetch_add(1, Ordering::SeqCst);
		});

		store.deny_reads(true);

		assert_eq!(repo.read(|c| c.value), 7);
		assert_eq!(failures.load(Ordering::SeqCst), 1);
		assert_eq!(store.saves(), 0);
		assert_eq!(store.contents(), Some(br#"{"value":1}"#.to_vec()));
	}
}
