//! Root-confined file access for scripts.
//!
//! Every path is relative to the project root.  Absolute paths and `..`
//! segments are rejected outright, and any path that already exists is
//! canonicalized so a symlink cannot lead outside the root.
//!
//! Scripts reach it through the `projectFs()` native registered by
//! [`install`]:
//!
//! ```text
//! var fs = projectFs()
//! if (!fs.exists("out")) { fs.createDir("out") }
//! fs.writeText("out/log.txt", "hello")
//! for (e in fs.list("out")) { print(e.name) }
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use thiserror::Error;
use tracing::debug;

use crate::script::{NativeFunction, Object, ScriptEngine, ScriptError, Value};

/// Default read and write limit: 10 MiB.
pub const DEFAULT_LIMIT: u64 = 10 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ProjectFsError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    AccessDenied(String),
    #[error("{0}")]
    InvalidPath(String),
    #[error("{0}")]
    TooLarge(String),
    #[error("{0}")]
    InvalidOperation(String),
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ProjectFsError>;

fn io_error(path: &str) -> impl FnOnce(io::Error) -> ProjectFsError + '_ {
    move |source| ProjectFsError::Io {
        path: path.to_owned(),
        source,
    }
}

/// One `list` result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectFsEntry {
    /// Root-relative, `/`-separated.
    pub path: String,
    pub name: String,
    pub is_directory: bool,
}

#[derive(Debug, Clone)]
pub struct ProjectFs {
    root: PathBuf,
    max_read: u64,
    max_write: u64,
}

impl ProjectFs {
    /// Open (creating if needed) a project rooted at `root`.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        Self::with_limits(root, DEFAULT_LIMIT, DEFAULT_LIMIT)
    }

    pub fn with_limits(root: impl AsRef<Path>, max_read: u64, max_write: u64) -> Result<Self> {
        let root = root.as_ref();
        let shown = root.display().to_string();
        if shown.trim().is_empty() {
            return Err(ProjectFsError::InvalidPath(
                "Project root must not be empty.".into(),
            ));
        }
        fs::create_dir_all(root).map_err(io_error(&shown))?;
        let root = fs::canonicalize(root).map_err(io_error(&shown))?;
        Ok(ProjectFs {
            root,
            max_read,
            max_write,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // ── Operations ────────────────────────────────────────────────────────────

    /// Entries of `dir`, directories first, then by case-insensitive name.
    pub fn list(&self, dir: &str) -> Result<Vec<ProjectFsEntry>> {
        let rel = normalize(dir)?;
        let abs = self.existing(&rel, dir)?;
        if !abs.is_dir() {
            return Err(ProjectFsError::NotFound(format!(
                "Directory not found: '{dir}'."
            )));
        }

        let mut entries = Vec::new();
        for entry in fs::read_dir(&abs).map_err(io_error(dir))? {
            let entry = entry.map_err(io_error(dir))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let path = if rel.is_empty() {
                name.clone()
            } else {
                format!("{rel}/{name}")
            };
            entries.push(ProjectFsEntry {
                is_directory: entry.path().is_dir(),
                path,
                name,
            });
        }
        entries.sort_by(|a, b| {
            b.is_directory
                .cmp(&a.is_directory)
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        });
        Ok(entries)
    }

    pub fn exists(&self, path: &str) -> Result<bool> {
        let rel = normalize(path)?;
        match fs::canonicalize(self.root.join(&rel)) {
            Ok(real) => {
                self.ensure_inside(&real)?;
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error(path)(e)),
        }
    }

    pub fn read_text(&self, path: &str) -> Result<String> {
        let rel = normalize(path)?;
        let abs = self.existing(&rel, path)?;
        if !abs.is_file() {
            return Err(ProjectFsError::NotFound(format!("File not found: '{path}'.")));
        }
        let len = fs::metadata(&abs).map_err(io_error(path))?.len();
        if len > self.max_read {
            return Err(ProjectFsError::TooLarge(format!(
                "File '{path}' exceeds read limit ({} bytes).",
                self.max_read
            )));
        }
        fs::read_to_string(&abs).map_err(io_error(path))
    }

    pub fn write_text(&self, path: &str, content: &str) -> Result<()> {
        if content.len() as u64 > self.max_write {
            return Err(ProjectFsError::TooLarge(format!(
                "Write payload exceeds limit ({} bytes).",
                self.max_write
            )));
        }
        let target = self.with_parent(path)?;
        // fs::write follows a symlink even when its destination is missing.
        match fs::symlink_metadata(&target) {
            Ok(_) => match fs::canonicalize(&target) {
                Ok(real) => self.ensure_inside(&real)?,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    return Err(ProjectFsError::AccessDenied(format!(
                        "'{path}' is a symlink to a missing target."
                    )))
                }
                Err(e) => return Err(io_error(path)(e)),
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(io_error(path)(e)),
        }
        debug!(path, bytes = content.len(), "project write");
        fs::write(&target, content).map_err(io_error(path))
    }

    /// Create a directory; succeeds if it already exists.
    pub fn create_dir(&self, path: &str) -> Result<()> {
        let target = self.with_parent(path)?;
        if target.is_dir() {
            return Ok(());
        }
        debug!(path, "project mkdir");
        fs::create_dir(&target).map_err(io_error(path))
    }

    /// Delete a file or an empty directory.
    pub fn delete(&self, path: &str) -> Result<()> {
        let rel = normalize(path)?;
        if rel.is_empty() {
            return Err(ProjectFsError::InvalidOperation(
                "Cannot delete the project root.".into(),
            ));
        }
        self.existing(&rel, path)?;
        let target = self.root.join(&rel);
        let meta = fs::symlink_metadata(&target).map_err(io_error(path))?;
        debug!(path, "project delete");
        if meta.is_dir() {
            let mut children = fs::read_dir(&target).map_err(io_error(path))?;
            if children.next().is_some() {
                return Err(ProjectFsError::InvalidOperation(
                    "Directory is not empty.".into(),
                ));
            }
            fs::remove_dir(&target).map_err(io_error(path))
        } else {
            fs::remove_file(&target).map_err(io_error(path))
        }
    }

    // ── Resolution ────────────────────────────────────────────────────────────

    /// Canonical location of an existing `rel`, which must stay inside the root.
    fn existing(&self, rel: &str, shown: &str) -> Result<PathBuf> {
        match fs::canonicalize(self.root.join(rel)) {
            Ok(real) => {
                self.ensure_inside(&real)?;
                Ok(real)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(ProjectFsError::NotFound(
                format!("Path not found: '{shown}'."),
            )),
            Err(e) => Err(io_error(shown)(e)),
        }
    }

    /// Target path whose parent directory exists inside the root.
    fn with_parent(&self, path: &str) -> Result<PathBuf> {
        let rel = normalize(path)?;
        let target = self.root.join(&rel);
        let parent = match target.parent() {
            Some(p) if !rel.is_empty() => p,
            _ => {
                return Err(ProjectFsError::InvalidPath(format!(
                    "'{path}' does not name an entry."
                )))
            }
        };
        match fs::canonicalize(parent) {
            Ok(real) if real.is_dir() => self.ensure_inside(&real)?,
            _ => {
                return Err(ProjectFsError::NotFound(format!(
                    "Parent directory does not exist for '{path}'."
                )))
            }
        }
        Ok(target)
    }

    fn ensure_inside(&self, real: &Path) -> Result<()> {
        if real.starts_with(&self.root) {
            Ok(())
        } else {
            Err(ProjectFsError::AccessDenied(
                "Path resolves outside project root.".into(),
            ))
        }
    }
}

/// Validate a script-supplied path and return it as `/`-joined segments
/// (empty for the root).
fn normalize(path: &str) -> Result<String> {
    let raw = path.replace('\\', "/");
    let raw = raw.trim();
    if raw.starts_with('/') || Path::new(raw).is_absolute() || has_drive_prefix(raw) {
        return Err(ProjectFsError::InvalidPath(
            "Absolute paths are not allowed.".into(),
        ));
    }
    let mut segments = Vec::new();
    for seg in raw.split('/').map(str::trim) {
        match seg {
            "" | "." => {}
            ".." => {
                return Err(ProjectFsError::InvalidPath(
                    "Path traversal is not allowed.".into(),
                ))
            }
            s => segments.push(s),
        }
    }
    Ok(segments.join("/"))
}

fn has_drive_prefix(raw: &str) -> bool {
    let b = raw.as_bytes();
    b.len() >= 2 && b[0].is_ascii_alphabetic() && b[1] == b':'
}

// ── Script binding ────────────────────────────────────────────────────────────

/// Register `projectFs()` on `engine`, returning an object whose fields are
/// natives: `list`, `exists`, `readText`, `writeText`, `createDir`, `delete`.
pub fn install(engine: &mut ScriptEngine, project: ProjectFs) {
    debug!(root = %project.root().display(), "installing projectFs");
    let project = Rc::new(project);
    engine.register_native(
        "projectFs",
        NativeFunction::simple(move |_| Ok(fs_object(&project))),
    );
}

type FsMethod = fn(&ProjectFs, &[Value]) -> Result<Value>;

fn fs_object(project: &Rc<ProjectFs>) -> Value {
    let bind = |f: FsMethod| {
        let project = Rc::clone(project);
        Value::native(NativeFunction::simple(move |args| {
            f(&project, args).map_err(to_script_error)
        }))
    };
    let methods: [(&str, FsMethod); 6] = [
        ("list", |fs, args| {
            let dir = match args.first() {
                None | Some(Value::Null) => ".".to_owned(),
                Some(v) => v.to_string(),
            };
            let entries = fs
                .list(&dir)?
                .into_iter()
                .map(|e| {
                    Value::object(
                        Object::new("ProjectFsEntry")
                            .field("path", e.path)
                            .field("name", e.name)
                            .field("isDirectory", e.is_directory),
                    )
                })
                .collect();
            Ok(Value::array(entries))
        }),
        ("exists", |fs, args| Ok(Value::Bool(fs.exists(&arg(args, 0))?))),
        ("readText", |fs, args| Ok(Value::Str(fs.read_text(&arg(args, 0))?))),
        ("writeText", |fs, args| {
            fs.write_text(&arg(args, 0), &arg(args, 1))?;
            Ok(Value::Null)
        }),
        ("createDir", |fs, args| {
            fs.create_dir(&arg(args, 0))?;
            Ok(Value::Null)
        }),
        ("delete", |fs, args| {
            fs.delete(&arg(args, 0))?;
            Ok(Value::Null)
        }),
    ];
    let mut obj = Object::new("ProjectFs");
    for (name, f) in methods {
        obj = obj.field(name, bind(f));
    }
    Value::object(obj)
}

/// Display string of argument `i`; missing or null gives `""`.
fn arg(args: &[Value], i: usize) -> String {
    match args.get(i) {
        None | Some(Value::Null) => String::new(),
        Some(v) => v.to_string(),
    }
}

fn to_script_error(e: ProjectFsError) -> ScriptError {
    ScriptError::runtime(e.to_string(), None).with_source(e)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> (tempfile::TempDir, ProjectFs) {
        let dir = tempfile::tempdir().unwrap();
        let fs = ProjectFs::new(dir.path()).unwrap();
        (dir, fs)
    }

    #[test]
    fn read_write_inside_root() {
        let (_dir, fs) = project();
        fs.create_dir("src").unwrap();
        fs.write_text("src/app.sms", "fun main() { return 1 }").unwrap();
        assert_eq!(fs.read_text("src/app.sms").unwrap(), "fun main() { return 1 }");
        assert!(fs.exists("src/app.sms").unwrap());
        assert!(fs.exists("./src//app.sms").unwrap());
        assert!(!fs.exists("src/other.sms").unwrap());
    }

    #[test]
    fn traversal_rejected() {
        let (_dir, fs) = project();
        assert!(matches!(
            fs.read_text("../secret.txt"),
            Err(ProjectFsError::InvalidPath(_))
        ));
        assert!(matches!(
            fs.write_text("a/../../x", ""),
            Err(ProjectFsError::InvalidPath(_))
        ));
    }

    #[test]
    fn absolute_rejected() {
        let (_dir, fs) = project();
        assert!(matches!(fs.exists("/etc/passwd"), Err(ProjectFsError::InvalidPath(_))));
        assert!(matches!(fs.exists("C:\\x"), Err(ProjectFsError::InvalidPath(_))));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_escape_rejected() {
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret.txt"), "secret").unwrap();
        let (dir, fs) = project();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("escape")).unwrap();

        assert!(matches!(
            fs.read_text("escape/secret.txt"),
            Err(ProjectFsError::AccessDenied(_))
        ));
        assert!(matches!(
            fs.write_text("escape/new.txt", "x"),
            Err(ProjectFsError::AccessDenied(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_not_followed() {
        let outside = tempfile::tempdir().unwrap();
        let victim = outside.path().join("pwned.txt");
        let (dir, fs) = project();
        std::os::unix::fs::symlink(&victim, dir.path().join("link.txt")).unwrap();

        assert!(matches!(
            fs.write_text("link.txt", "hi"),
            Err(ProjectFsError::AccessDenied(_))
        ));
        assert!(!victim.exists());
    }

    #[cfg(unix)]
    #[test]
    fn symlink_inside_root_is_writable() {
        let (dir, fs) = project();
        fs.write_text("real.txt", "old").unwrap();
        std::os::unix::fs::symlink(dir.path().join("real.txt"), dir.path().join("alias.txt"))
            .unwrap();
        fs.write_text("alias.txt", "new").unwrap();
        assert_eq!(fs.read_text("real.txt").unwrap(), "new");
    }

    #[test]
    fn size_limits() {
        let dir = tempfile::tempdir().unwrap();
        let fs = ProjectFs::with_limits(dir.path(), 4, 4).unwrap();
        fs.write_text("tiny.txt", "1234").unwrap();
        assert!(matches!(
            fs.write_text("big.txt", "12345"),
            Err(ProjectFsError::TooLarge(_))
        ));
        std::fs::write(dir.path().join("read-big.txt"), "12345").unwrap();
        assert!(matches!(
            fs.read_text("read-big.txt"),
            Err(ProjectFsError::TooLarge(_))
        ));
    }

    #[test]
    fn list_orders_directories_first() {
        let (_dir, fs) = project();
        fs.write_text("b.txt", "").unwrap();
        fs.write_text("A.txt", "").unwrap();
        fs.create_dir("zdir").unwrap();
        let names: Vec<_> = fs.list(".").unwrap().into_iter().map(|e| e.path).collect();
        assert_eq!(names, vec!["zdir", "A.txt", "b.txt"]);
        assert!(matches!(fs.list("nope"), Err(ProjectFsError::NotFound(_))));
    }

    #[test]
    fn delete_rules() {
        let (_dir, fs) = project();
        fs.create_dir("d").unwrap();
        fs.write_text("d/f.txt", "x").unwrap();
        assert!(matches!(fs.delete("d"), Err(ProjectFsError::InvalidOperation(_))));
        fs.delete("d/f.txt").unwrap();
        fs.delete("d").unwrap();
        assert!(!fs.exists("d").unwrap());
        assert!(matches!(fs.delete("d"), Err(ProjectFsError::NotFound(_))));
        assert!(matches!(fs.delete("."), Err(ProjectFsError::InvalidOperation(_))));
    }

    #[test]
    fn write_needs_parent() {
        let (_dir, fs) = project();
        assert!(matches!(
            fs.write_text("missing/x.txt", "x"),
            Err(ProjectFsError::NotFound(_))
        ));
    }

    #[test]
    fn script_binding() {
        let (_dir, fs) = project();
        let mut engine = ScriptEngine::new();
        install(&mut engine, fs);
        let v = engine
            .execute(
                "var fs = projectFs()\nfs.createDir(\"notes\")\nfs.writeText(\"notes/a.txt\", \"hi ${1 + 1}\")\nvar names = []\nfor (e in fs.list(\"notes\")) { names.add(e.path) }\n[fs.readText(\"notes/a.txt\"), names, fs.exists(\"notes/b.txt\")]",
            )
            .unwrap();
        assert_eq!(v.to_string(), "[hi 2, [notes/a.txt], False]");
    }

    #[test]
    fn script_errors_carry_cause() {
        let (_dir, fs) = project();
        let mut engine = ScriptEngine::new();
        install(&mut engine, fs);
        let err = engine.execute("projectFs().readText(\"../x\")").unwrap_err();
        assert_eq!(err.message(), "Path traversal is not allowed.");
        let cause = std::error::Error::source(&err).unwrap();
        assert!(cause.downcast_ref::<ProjectFsError>().is_some());
    }
}
