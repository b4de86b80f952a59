use directories::BaseDirs;
use std::path::PathBuf;

pub const DATA_DIR_ENV: &str = "EZFINGERPRINT_DATA_DIR";

pub fn app_name() -> &'static str {
  if cfg!(debug_assertions) {
    "EZFingerprintDev"
  } else {
    "EZFingerprint"
  }
}

/// Root directory for every file-backed store. Falls back to the working
/// directory when the platform exposes no home directory.
pub fn data_dir() -> PathBuf {
  #[cfg(test)]
  {
    if let Some(dir) = TEST_DATA_DIR.with(|cell| cell.borrow().clone()) {
      return dir;
    }
  }

  if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
    return PathBuf::from(dir);
  }

  match BaseDirs::new() {
    Some(dirs) => dirs.data_local_dir().join(app_name()),
    None => PathBuf::from(".").join(app_name()),
  }
}

pub fn settings_dir() -> PathBuf {
  data_dir().join("settings")
}

pub fn cookie_jar_path() -> PathBuf {
  data_dir().join("cookies.json")
}

pub fn local_storage_path() -> PathBuf {
  data_dir().join("local_storage.json")
}

pub fn database_path() -> PathBuf {
  data_dir().join("EZFingerprint.sqlite")
}

#[cfg(test)]
thread_local! {
  static TEST_DATA_DIR: std::cell::RefCell<Option<PathBuf>> = const { std::cell::RefCell::new(None) };
}

#[cfg(test)]
pub struct TestDirGuard;

#[cfg(test)]
impl Drop for TestDirGuard {
  fn drop(&mut self) {
    TEST_DATA_DIR.with(|cell| *cell.borrow_mut() = None);
  }
}

#[cfg(test)]
pub fn set_test_data_dir(dir: PathBuf) -> TestDirGuard {
  TEST_DATA_DIR.with(|cell| *cell.borrow_mut() = Some(dir));
  TestDirGuard
}
