//! Gzip-compressed tar archives of package versions.
//!
//! Archives hold files only, with `/`-separated paths relative to the
//! version root. Headers carry fixed mtime, owner and mode, and files are
//! added in sorted order, so equal file sets yield byte-identical archives.

use flate2::{Compression, read::GzDecoder, write::GzEncoder};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use tar::{Archive, Builder, EntryType, Header};

use crate::{DOC_FILE, RepoError, repositories::local_file_system::walk_files};

/// Metadata of one archive entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub path: PathBuf,
    pub size: u64,
    pub is_dir: bool,
}

pub struct ArchiveWriter {
    builder: Builder<GzEncoder<File>>,
}

impl ArchiveWriter {
    pub fn create(path: &Path, compression_level: u32) -> Result<Self, RepoError> {
        let file = File::create(path)?;
        let encoder = GzEncoder::new(file, Compression::new(compression_level));
        Ok(Self {
            builder: Builder::new(encoder),
        })
    }

    pub fn add_file(&mut self, local_path: &Path, archive_name: &str) -> Result<(), RepoError> {
        let file = File::open(local_path)?;
        let size = file.metadata()?.len();

        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_size(size);
        header.set_mode(0o644);
        header.set_mtime(0);
        header.set_uid(0);
        header.set_gid(0);

        self.builder
            .append_data(&mut header, archive_name, file)
            .map_err(|e| RepoError::archive(format!("Failed to add {}: {}", archive_name, e)))
    }

    pub fn finish(self) -> Result<(), RepoError> {
        let encoder = self
            .builder
            .into_inner()
            .map_err(|e| RepoError::archive(e.to_string()))?;
        let file = encoder.finish()?;
        file.sync_all()?;
        Ok(())
    }
}

/// Forward-only reader; each call re-opens the archive from the start.
pub struct ArchiveReader {
    path: PathBuf,
}

impl ArchiveReader {
    pub fn open(path: &Path) -> Result<Self, RepoError> {
        if !path.is_file() {
            return Err(RepoError::IoError(io::Error::new(
                io::ErrorKind::NotFound,
                format!("archive not found: {}", path.display()),
            )));
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    fn archive(&self) -> Result<Archive<GzDecoder<File>>, RepoError> {
        let file = File::open(&self.path)?;
        Ok(Archive::new(GzDecoder::new(file)))
    }

    /// Scans until the entry called `name` and hands its content to `f`.
    /// Returns `None` when no such entry exists; later entries are not read.
    pub fn read_entry<T, F>(&self, name: &str, f: F) -> Result<Option<T>, RepoError>
    where
        F: FnOnce(&ArchiveEntry, &mut dyn Read) -> Result<T, RepoError>,
    {
        let mut archive = self.archive()?;
        let entries = archive
            .entries()
            .map_err(|e| RepoError::archive(e.to_string()))?;

        for entry in entries {
            let mut entry = entry.map_err(|e| RepoError::archive(e.to_string()))?;
            let meta = entry_metadata(&entry)?;
            if !meta.is_dir && meta.path == Path::new(name) {
                return f(&meta, &mut entry).map(Some);
            }
        }

        Ok(None)
    }

    /// Visits every entry in order. Directory entries come without a stream.
    pub fn read_all<F>(&self, mut f: F) -> Result<(), RepoError>
    where
        F: FnMut(&ArchiveEntry, Option<&mut dyn Read>) -> Result<(), RepoError>,
    {
        let mut archive = self.archive()?;
        let entries = archive
            .entries()
            .map_err(|e| RepoError::archive(e.to_string()))?;

        for entry in entries {
            let mut entry = entry.map_err(|e| RepoError::archive(e.to_string()))?;
            let meta = entry_metadata(&entry)?;
            match entry.header().entry_type() {
                EntryType::Directory => f(&meta, None)?,
                EntryType::Regular | EntryType::Continuous | EntryType::GNUSparse => {
                    f(&meta, Some(&mut entry))?
                }
                // Links and special files are not part of package content.
                _ => continue,
            }
        }

        Ok(())
    }
}

fn entry_metadata<R: Read>(entry: &tar::Entry<'_, R>) -> Result<ArchiveEntry, RepoError> {
    let raw = entry
        .path()
        .map_err(|e| RepoError::archive(e.to_string()))?;
    let path = sanitize_entry_path(&raw)?;
    Ok(ArchiveEntry {
        path,
        size: entry.header().size().unwrap_or(0),
        is_dir: entry.header().entry_type() == EntryType::Directory,
    })
}

/// Strips `./` prefixes and rejects absolute or parent-escaping paths.
fn sanitize_entry_path(raw: &Path) -> Result<PathBuf, RepoError> {
    let mut clean = PathBuf::new();
    for component in raw.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            _ => {
                return Err(RepoError::archive(format!(
                    "Unsafe entry path in archive: {}",
                    raw.display()
                )));
            }
        }
    }
    Ok(clean)
}

fn archive_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// True for the version-root documentation file.
pub fn is_doc_file(relative: &Path) -> bool {
    relative == Path::new(DOC_FILE)
}

/// Archives every file of `dir` except the documentation file, in sorted
/// order. Returns the number of files written.
pub fn pack_directory(dir: &Path, dest: &Path, compression_level: u32) -> Result<usize, RepoError> {
    let files: Vec<PathBuf> = walk_files(dir)?
        .into_iter()
        .filter(|f| !is_doc_file(f))
        .collect();

    let mut writer = ArchiveWriter::create(dest, compression_level)?;
    for relative in &files {
        writer.add_file(&dir.join(relative), &archive_name(relative))?;
    }
    writer.finish()?;

    Ok(files.len())
}

/// Extracts every entry under `dest`, creating parents as needed.
pub fn unpack_into(reader: &ArchiveReader, dest: &Path) -> Result<usize, RepoError> {
    let mut files = 0;

    reader.read_all(|entry, content| {
        let target = dest.join(&entry.path);
        match content {
            None => std::fs::create_dir_all(&target)?,
            Some(content) => {
                if let Some(parent) = target.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                let mut out = File::create(&target)?;
                io::copy(content, &mut out)?;
                files += 1;
            }
        }
        Ok(())
    })?;

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_tree(root: &Path, files: &[(&str, &str)]) {
        for (name, content) in files {
            let path = root.join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
    }

    #[test]
    fn test_archive_is_deterministic_across_creation_order() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();

        write_tree(
            a.path(),
            &[("package.toml", "m"), ("src/lib.txt", "l"), ("z.txt", "z")],
        );
        write_tree(
            b.path(),
            &[("z.txt", "z"), ("src/lib.txt", "l"), ("package.toml", "m")],
        );

        let first = out.path().join("a.tar.gz");
        let second = out.path().join("b.tar.gz");
        pack_directory(a.path(), &first, 9).unwrap();
        pack_directory(b.path(), &second, 9).unwrap();

        assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
    }

    #[test]
    fn test_doc_file_skipped() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_tree(
            src.path(),
            &[("package.toml", "m"), ("README.md", "docs"), ("docs/README.md", "kept")],
        );

        let archive = out.path().join("pkg.tar.gz");
        assert_eq!(pack_directory(src.path(), &archive, 9).unwrap(), 2);

        let reader = ArchiveReader::open(&archive).unwrap();
        let mut names = Vec::new();
        reader
            .read_all(|entry, _| {
                names.push(entry.path.clone());
                Ok(())
            })
            .unwrap();
        assert_eq!(
            names,
            vec![PathBuf::from("docs/README.md"), PathBuf::from("package.toml")]
        );
    }

    #[test]
    fn test_read_entry_and_unpack() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_tree(src.path(), &[("package.toml", "manifest"), ("a/b/c.txt", "deep")]);

        let archive = out.path().join("pkg.tar.gz");
        pack_directory(src.path(), &archive, 6).unwrap();
        let reader = ArchiveReader::open(&archive).unwrap();

        let manifest = reader
            .read_entry("package.toml", |_, content| {
                let mut text = String::new();
                content.read_to_string(&mut text)?;
                Ok(text)
            })
            .unwrap();
        assert_eq!(manifest.as_deref(), Some("manifest"));
        assert!(reader.read_entry("missing", |_, _| Ok(())).unwrap().is_none());

        let dest = out.path().join("unpacked");
        assert_eq!(unpack_into(&reader, &dest).unwrap(), 2);
        assert_eq!(fs::read_to_string(dest.join("a/b/c.txt")).unwrap(), "deep");
    }

    #[test]
    fn test_unsafe_paths_rejected() {
        assert!(sanitize_entry_path(Path::new("../etc/passwd")).is_err());
        assert!(sanitize_entry_path(Path::new("/abs")).is_err());
        assert_eq!(
            sanitize_entry_path(Path::new("./pkg/file")).unwrap(),
            PathBuf::from("pkg/file")
        );
    }
}
