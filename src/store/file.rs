//! JSON file store guarded by a sidecar advisory lock.

// std
use std::{
	ffi::OsString,
	fs::{self, File, OpenOptions},
	io::{self, Write},
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	store::{ConfigPersistenceError, ConfigStore, StoreLock},
};

/// Persists one configuration document at a fixed path.
///
/// Writers serialize through an exclusive lock on `<path>.lock`; the document itself is
/// replaced by writing `<path>.tmp` and renaming it over the target, so unlocked readers never
/// observe a torn file.
#[derive(Clone, Debug)]
pub struct DiskStore {
	path: PathBuf,
	lock_path: PathBuf,
	tmp_path: PathBuf,
}
impl DiskStore {
	/// Creates a store for `path`; nothing touches the filesystem until first use.
	pub fn new(path: impl Into<PathBuf>) -> Self {
		let path = path.into();
		let lock_path = sidecar(&path, ".lock");
		let tmp_path = sidecar(&path, ".tmp");

		Self { path, lock_path, tmp_path }
	}

	/// Path of the configuration document.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn ensure_parent_exists(&self) -> io::Result<()> {
		match self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
			Some(parent) => fs::create_dir_all(parent),
			None => Ok(()),
		}
	}

	fn write_tmp(&self, bytes: &[u8]) -> io::Result<()> {
		let mut options = OpenOptions::new();

		options.write(true).create(true).truncate(true);

		#[cfg(unix)]
		{
			use std::os::unix::fs::OpenOptionsExt;

			options.mode(0o600);
		}

		let mut file = options.open(&self.tmp_path)?;

		file.write_all(bytes)?;
		file.sync_all()
	}
}
impl ConfigStore for DiskStore {
	fn location(&self) -> String {
		self.path.display().to_string()
	}

	fn load(&self) -> Result<Option<Vec<u8>>, ConfigPersistenceError> {
		match fs::read(&self.path) {
			Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(None),
			Ok(bytes) => Ok(Some(bytes)),
			Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
			Err(e) => Err(ConfigPersistenceError::read(self.location(), e)),
		}
	}

	fn lock(&self) -> Result<StoreLock, ConfigPersistenceError> {
		let lock_error = |source| ConfigPersistenceError::Lock { location: self.location(), source };

		self.ensure_parent_exists().map_err(lock_error)?;

		let file = OpenOptions::new()
			.read(true)
			.write(true)
			.create(true)
			.truncate(false)
			.open(&self.lock_path)
			.map_err(lock_error)?;

		file.lock().map_err(lock_error)?;

		Ok(StoreLock::new(FileLockGuard(file)))
	}

	fn save(&self, _lock: &StoreLock, bytes: &[u8]) -> Result<(), ConfigPersistenceError> {
		let write_error = |source| ConfigPersistenceError::Write { location: self.location(), source };

		self.ensure_parent_exists().map_err(write_error)?;
		self.write_tmp(bytes).map_err(write_error)?;

		fs::rename(&self.tmp_path, &self.path).map_err(write_error)
	}
}

struct FileLockGuard(File);
impl Drop for FileLockGuard {
	fn drop(&mut self) {
		// Closing the descriptor releases the lock as well.
		let _ = self.0.unlock();
	}
}

fn sidecar(path: &Path, suffix: &str) -> PathBuf {
	let mut name = path.file_name().map(OsString::from).unwrap_or_default();

	name.push(suffix);

	path.with_file_name(name)
}
