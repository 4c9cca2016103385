use std::fs;
use std::io;
use std::path::Path;

/// Read/write access to the configuration files
pub trait FileAccess: Send + Sync {
    fn exists(&self, path: &Path) -> bool;

    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Replace the file contents, creating the parent directory if needed
    fn write(&self, path: &Path, contents: &str) -> io::Result<()>;
}

/// `FileAccess` backed by the real file system
#[derive(Debug, Default, Clone, Copy)]
pub struct OsFileSystem;

impl FileAccess for OsFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        // Readers never observe a half-written file
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        fs::write(&tmp, contents)?;
        if let Err(e) = fs::rename(&tmp, path) {
            fs::remove_file(&tmp).ok();
            return Err(e);
        }
        Ok(())
    }
}
