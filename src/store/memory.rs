//! In-process [`ConfigStore`] for tests and ephemeral sessions.

// std
use std::{
	io,
	sync::atomic::{AtomicBool, AtomicU64, Ordering},
};
// crates.io
use parking_lot::Condvar;
// self
use crate::{
	_prelude::*,
	store::{ConfigPersistenceError, ConfigStore, StoreLock},
};

const LOCATION: &str = "memory";

/// Shared in-memory document with load/save counters and failure toggles.
///
/// Clones share the same document, so a test can keep one handle for inspection while a
/// repository owns another.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(Arc<MemoryInner>);
impl MemoryStore {
	/// Creates a store pre-populated with `bytes`.
	pub fn with_contents(bytes: impl Into<Vec<u8>>) -> Self {
		let store = Self::default();

		store.set_contents(bytes);

		store
	}

	/// Current document, if any.
	pub fn contents(&self) -> Option<Vec<u8>> {
		self.0.bytes.lock().clone()
	}

	/// Replaces the document without taking the lock, as an uncoordinated writer would.
	pub fn set_contents(&self, bytes: impl Into<Vec<u8>>) {
		*self.0.bytes.lock() = Some(bytes.into());
	}

	/// Number of [`ConfigStore::load`] calls served.
	pub fn loads(&self) -> u64 {
		self.0.loads.load(Ordering::SeqCst)
	}

	/// Number of successful [`ConfigStore::save`] calls.
	pub fn saves(&self) -> u64 {
		self.0.saves.load(Ordering::SeqCst)
	}

	/// Makes subsequent loads fail with a permission error.
	#[cfg(any(test, feature = "test"))]
	pub fn deny_reads(&self, deny: bool) {
		self.0.deny_reads.store(deny, Ordering::SeqCst);
	}

	/// Makes subsequent lock attempts fail.
	#[cfg(any(test, feature = "test"))]
	pub fn fail_locks(&self, fail: bool) {
		self.0.fail_locks.store(fail, Ordering::SeqCst);
	}

	/// Returns `true` while some caller holds the lock.
	pub fn is_locked(&self) -> bool {
		*self.0.locked.lock()
	}
}
impl ConfigStore for MemoryStore {
	fn location(&self) -> String {
		LOCATION.into()
	}

	fn load(&self) -> Result<Option<Vec<u8>>, ConfigPersistenceError> {
		self.0.loads.fetch_add(1, Ordering::SeqCst);

		if self.0.deny_reads.load(Ordering::SeqCst) {
			return Err(ConfigPersistenceError::read(
				LOCATION,
				io::Error::from(io::ErrorKind::PermissionDenied),
			));
		}

		Ok(self.contents())
	}

	fn lock(&self) -> Result<StoreLock, ConfigPersistenceError> {
		if self.0.fail_locks.load(Ordering::SeqCst) {
			return Err(ConfigPersistenceError::Lock {
				location: LOCATION.into(),
				source: io::Error::other("lock unavailable"),
			});
		}

		let mut locked = self.0.locked.lock();

		while *locked {
			self.0.released.wait(&mut locked);
		}

		*locked = true;

		Ok(StoreLock::new(MemoryLockGuard(self.0.clone())))
	}

	fn save(&self, _lock: &StoreLock, bytes: &[u8]) -> Result<(), ConfigPersistenceError> {
		self.set_contents(bytes);
		self.0.saves.fetch_add(1, Ordering::SeqCst);

		Ok(())
	}
}

#[derive(Debug, Default)]
struct MemoryInner {
	bytes: Mutex<Option<Vec<u8>>>,
	locked: Mutex<bool>,
	released: Condvar,
	loads: AtomicU64,
	saves: AtomicU64,
	deny_reads: AtomicBool,
	fail_locks: AtomicBool,
}

struct MemoryLockGuard(Arc<MemoryInner>);
impl Drop for MemoryLockGuard {
	fn drop(&mut self) {
		*self.0.locked.lock() = false;
		self.0.released.notify_one();
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{thread, time::Duration as StdDuration};
	// self
	use super::*;

	#[test]
	fn counts_loads_and_saves() {
		let store = MemoryStore::with_contents("{}");

		assert_eq!(store.load().expect("Load should succeed."), Some(b"{}".to_vec()));

		let lock = store.lock().expect("Lock should be acquired.");

		store.save(&lock, b"{\"a\":1}").expect("Save should succeed.");

		assert_eq!(store.loads(), 1);
		assert_eq!(store.saves(), 1);
		assert_eq!(store.contents(), Some(b"{\"a\":1}".to_vec()));
	}

	#[test]
	fn lock_blocks_until_released() {
		let store = MemoryStore::default();
		let lock = store.lock().expect("Lock should be acquired.");
		let contender = store.clone();
		let handle = thread::spawn(move || {
			let _lock = contender.lock().expect("Contender should eventually lock.");

			contender.saves()
		});

		thread::sleep(StdDuration::from_millis(50));

		assert!(store.is_locked());
		assert!(!handle.is_finished());

		store.save(&lock, b"{}").expect("Save should succeed.");
		drop(lock);

		assert_eq!(handle.join().expect("Contender should not panic."), 1);
	}

	#[test]
	fn failure_toggles_surface_errors() {
		let store = MemoryStore::default();

		store.deny_reads(true);
		store.fail_locks(true);

		assert!(matches!(store.load(), Err(ConfigPersistenceError::PermissionDenied { .. })));
		assert!(matches!(store.lock(), Err(ConfigPersistenceError::Lock { .. })));
	}
}
