//! Backend seam shared by the dlog commands.
//!
//! Commands are written against [`DlogBackend`]; the filesystem
//! implementation is the real thing, the in-memory implementation drives
//! the test suites without touching disk, environment, or clock.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use chrono::NaiveDateTime;

use crate::tools::{InMemoryToolRunner, SubprocessToolRunner, ToolRunner};

pub trait DlogBackend {
    fn env_var(&self, name: &str) -> Option<String>;
    fn home_dir(&self) -> Option<PathBuf>;
    fn now(&self) -> NaiveDateTime;
    fn file_exists(&self, path: &Path) -> bool;
    fn dir_exists(&self, path: &Path) -> bool;
    fn read_file(&self, path: &Path) -> Result<String, String>;
    fn write_file(&self, path: &Path, contents: &str) -> Result<(), String>;
    fn create_dir_all(&self, path: &Path) -> Result<(), String>;
    fn tool_runner(&self) -> Rc<dyn ToolRunner>;
}

// ---------------------------------------------------------------------------
// Filesystem
// ---------------------------------------------------------------------------

pub struct FilesystemBackend {
    tools: Rc<SubprocessToolRunner>,
}

impl FilesystemBackend {
    #[must_use]
    pub fn new() -> Self {
        let home = env::var_os("HOME").map(PathBuf::from);
        Self {
            tools: Rc::new(SubprocessToolRunner::new(home)),
        }
    }
}

impl Default for FilesystemBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DlogBackend for FilesystemBackend {
    fn env_var(&self, name: &str) -> Option<String> {
        env::var(name).ok()
    }

    fn home_dir(&self) -> Option<PathBuf> {
        env::var_os("HOME").map(PathBuf::from)
    }

    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }

    fn file_exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn dir_exists(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn read_file(&self, path: &Path) -> Result<String, String> {
        fs::read_to_string(path).map_err(|err| format!("read {}: {err}", path.display()))
    }

    fn write_file(&self, path: &Path, contents: &str) -> Result<(), String> {
        fs::write(path, contents).map_err(|err| format!("write {}: {err}", path.display()))
    }

    fn create_dir_all(&self, path: &Path) -> Result<(), String> {
        fs::create_dir_all(path).map_err(|err| format!("create {}: {err}", path.display()))
    }

    fn tool_runner(&self) -> Rc<dyn ToolRunner> {
        Rc::clone(&self.tools) as Rc<dyn ToolRunner>
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

pub struct InMemoryBackend {
    pub env: HashMap<String, String>,
    pub home: Option<PathBuf>,
    pub now: NaiveDateTime,
    pub files: RefCell<HashMap<PathBuf, String>>,
    pub dirs: HashSet<PathBuf>,
    pub created_dirs: RefCell<Vec<PathBuf>>,
    pub tools: Rc<InMemoryToolRunner>,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self {
            env: HashMap::new(),
            home: Some(PathBuf::from("/home/user")),
            now: fixture_now(),
            files: RefCell::new(HashMap::new()),
            dirs: HashSet::new(),
            created_dirs: RefCell::new(Vec::new()),
            tools: Rc::new(InMemoryToolRunner::default()),
        }
    }
}

/// Friday 2025-07-25 22:12:45, the fixture timestamp used across the suite.
#[must_use]
pub fn fixture_now() -> NaiveDateTime {
    chrono::NaiveDate::from_ymd_opt(2025, 7, 25)
        .and_then(|date| date.and_hms_opt(22, 12, 45))
        .unwrap_or_default()
}

impl InMemoryBackend {
    /// Seeds a file and registers its parent directories as existing.
    pub fn seed_file(&mut self, path: impl Into<PathBuf>, contents: &str) {
        let path = path.into();
        let mut parent = path.parent();
        while let Some(dir) = parent {
            self.dirs.insert(dir.to_path_buf());
            parent = dir.parent();
        }
        self.files.borrow_mut().insert(path, contents.to_string());
    }

    #[must_use]
    pub fn file(&self, path: impl Into<PathBuf>) -> Option<String> {
        self.files.borrow().get(&path.into()).cloned()
    }
}

impl DlogBackend for InMemoryBackend {
    fn env_var(&self, name: &str) -> Option<String> {
        self.env.get(name).cloned()
    }

    fn home_dir(&self) -> Option<PathBuf> {
        self.home.clone()
    }

    fn now(&self) -> NaiveDateTime {
        self.now
    }

    fn file_exists(&self, path: &Path) -> bool {
        self.files.borrow().contains_key(path)
    }

    fn dir_exists(&self, path: &Path) -> bool {
        self.dirs.contains(path)
    }

    fn read_file(&self, path: &Path) -> Result<String, String> {
        self.files
            .borrow()
            .get(path)
            .cloned()
            .ok_or_else(|| format!("read {}: file not found", path.display()))
    }

    fn write_file(&self, path: &Path, contents: &str) -> Result<(), String> {
        self.files
            .borrow_mut()
            .insert(path.to_path_buf(), contents.to_string());
        Ok(())
    }

    fn create_dir_all(&self, path: &Path) -> Result<(), String> {
        self.created_dirs.borrow_mut().push(path.to_path_buf());
        Ok(())
    }

    fn tool_runner(&self) -> Rc<dyn ToolRunner> {
        Rc::clone(&self.tools) as Rc<dyn ToolRunner>
    }
}
