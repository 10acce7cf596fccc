//! Backing stores and the lazily loaded, process-safe configuration repository.
//!
//! A [`ConfigStore`] moves whole JSON documents in and out of durable storage and provides a
//! cross-process advisory lock. [`ConfigRepository`] layers the in-process read/write lock,
//! one-time lazy loading, default seeding, and read-modify-write-under-lock semantics on top.

pub mod file;
pub mod memory;
pub mod repository;

pub use file::DiskStore;
pub use memory::MemoryStore;
pub use repository::*;

// std
use std::io;
// self
use crate::_prelude::*;

/// Byte-level persistence contract for one configuration document.
///
/// Implementations must make [`save`](ConfigStore::save) atomic with respect to
/// [`load`](ConfigStore::load): a reader sees either the previous or the new document, never
/// a partial one.
pub trait ConfigStore
where
	Self: Send + Sync,
{
	/// Human-readable location used in error reports.
	fn location(&self) -> String;

	/// Reads the current document; `None` when nothing has been persisted yet.
	fn load(&self) -> Result<Option<Vec<u8>>, ConfigPersistenceError>;

	/// Blocks until the cross-process advisory lock is held.
	fn lock(&self) -> Result<StoreLock, ConfigPersistenceError>;

	/// Replaces the document. Callers must hold the lock returned by [`lock`](ConfigStore::lock).
	fn save(&self, lock: &StoreLock, bytes: &[u8]) -> Result<(), ConfigPersistenceError>;
}

/// Advisory lock held on a [`ConfigStore`]; released on drop.
pub struct StoreLock {
	_held: Box<dyn Send>,
}
impl StoreLock {
	/// Wraps a guard whose `Drop` releases the underlying lock.
	pub fn new(guard: impl 'static + Send) -> Self {
		Self { _held: Box::new(guard) }
	}
}
impl Debug for StoreLock {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("StoreLock(..)")
	}
}

/// Persistence failures delivered to a repository's error handler.
#[derive(Debug, ThisError)]
pub enum ConfigPersistenceError {
	/// The configuration file exists but may not be read.
	#[error("Permission denied while reading {location}.")]
	PermissionDenied {
		/// Store location.
		location: String,
		/// Underlying IO failure.
		#[source]
		source: io::Error,
	},
	/// Reading failed for another reason.
	#[error("Failed to read {location}.")]
	Read {
		/// Store location.
		location: String,
		/// Underlying IO failure.
		#[source]
		source: io::Error,
	},
	/// The advisory lock could not be acquired.
	#[error("Failed to lock {location}.")]
	Lock {
		/// Store location.
		location: String,
		/// Underlying IO failure.
		#[source]
		source: io::Error,
	},
	/// Writing the new document failed.
	#[error("Failed to write {location}.")]
	Write {
		/// Store location.
		location: String,
		/// Underlying IO failure.
		#[source]
		source: io::Error,
	},
	/// The in-memory record could not be encoded.
	#[error("Failed to encode the configuration for {location}.")]
	Encode {
		/// Store location.
		location: String,
		/// Underlying serializer failure.
		#[source]
		source: serde_json::Error,
	},
}
impl ConfigPersistenceError {
	/// Location of the store that failed.
	pub fn location(&self) -> &str {
		match self {
			ConfigPersistenceError::PermissionDenied { location, .. }
			| ConfigPersistenceError::Read { location, .. }
			| ConfigPersistenceError::Lock { location, .. }
			| ConfigPersistenceError::Write { location, .. }
			| ConfigPersistenceError::Encode { location, .. } => location,
		}
	}

	/// Classifies a read failure, separating permission errors.
	pub fn read(location: impl Into<String>, source: io::Error) -> Self {
		let location = location.into();

		if source.kind() == io::ErrorKind::PermissionDenied {
			Self::PermissionDenied { location, source }
		} else {
			Self::Read { location, source }
		}
	}
}
