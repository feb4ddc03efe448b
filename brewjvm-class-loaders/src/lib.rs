use std::{
    fs::File,
    io::Read,
    path::{Path, PathBuf},
};

use brewjvm_base::{reader::ClassReader, ClassFile, ClassFileParseError};

pub const CLASS_EXTENSION: &str = "class";

#[derive(Debug)]
#[non_exhaustive]
pub enum LoadClassFileError {
    /// The path given was empty
    EmptyPath,
    /// The file did not exist
    NonexistentFile(PathBuf),
    /// There was an error in reading the file or stream
    ReadError(std::io::Error),
    /// The data was read but it was not a valid class file
    ParseError(ClassFileParseError),
}
impl From<ClassFileParseError> for LoadClassFileError {
    fn from(err: ClassFileParseError) -> Self {
        Self::ParseError(err)
    }
}

/// Read the entirety of the stream and parse it as a class file
pub fn load_from_stream<R: Read>(mut stream: R) -> Result<ClassFile, LoadClassFileError> {
    let mut data = Vec::new();
    stream
        .read_to_end(&mut data)
        .map_err(LoadClassFileError::ReadError)?;

    let mut reader = ClassReader::new(data.as_slice());
    let class_file = ClassFile::parse(&mut reader)?;

    let remaining = reader.remaining();
    if remaining != 0 {
        tracing::warn!("Class file had {} bytes after its end", remaining);
    }

    Ok(class_file)
}

pub fn load_from_file(path: &Path) -> Result<ClassFile, LoadClassFileError> {
    if path.as_os_str().is_empty() {
        return Err(LoadClassFileError::EmptyPath);
    }

    let file = File::open(path).map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            LoadClassFileError::NonexistentFile(path.to_owned())
        } else {
            LoadClassFileError::ReadError(err)
        }
    })?;

    tracing::info!("Loading class file {}", path.display());
    load_from_stream(std::io::BufReader::new(file))
}

/// Directories that class files are loaded from
#[derive(Debug, Default, Clone)]
pub struct ClassDirectories {
    directories: Vec<PathBuf>,
}
impl ClassDirectories {
    pub fn add(&mut self, path: &Path) -> std::io::Result<()> {
        self.directories.push(path.canonicalize()?);
        Ok(())
    }

    #[must_use]
    pub fn directories(&self) -> &[PathBuf] {
        &self.directories
    }

    /// Find the file for the class, by its internal name like `pkg/Hello`
    #[must_use]
    pub fn find_class_file(&self, class_name: &str) -> Option<PathBuf> {
        let rel_path = class_name_to_relative_path(class_name);
        self.directories
            .iter()
            .map(|dir| dir.join(&rel_path))
            .find(|path| path.is_file())
    }

    /// Load the class by its internal name, returning `None` if no directory holds it
    pub fn load_class_file(&self, class_name: &str) -> Result<Option<ClassFile>, LoadClassFileError> {
        match self.find_class_file(class_name) {
            Some(path) => load_from_file(&path).map(Some),
            None => Ok(None),
        }
    }

    /// The class files directly inside each of the directories, sorted by path within each
    /// directory. Subdirectories are not searched.
    pub fn class_file_paths(&self) -> Result<Vec<PathBuf>, LoadClassFileError> {
        let mut paths = Vec::new();
        for dir in &self.directories {
            let mut dir_paths = Vec::new();
            for entry in std::fs::read_dir(dir).map_err(LoadClassFileError::ReadError)? {
                let path = entry.map_err(LoadClassFileError::ReadError)?.path();
                let is_class = path
                    .extension()
                    .map_or(false, |ext| ext == CLASS_EXTENSION);
                if is_class && path.is_file() {
                    dir_paths.push(path);
                }
            }
            dir_paths.sort();
            paths.extend(dir_paths);
        }

        Ok(paths)
    }

    /// Load every class file directly inside the directories
    pub fn load_all(&self) -> Result<Vec<ClassFile>, LoadClassFileError> {
        self.class_file_paths()?
            .iter()
            .map(|path| load_from_file(path))
            .collect()
    }
}

/// `pkg/Hello` -> `pkg/Hello.class`
pub(crate) fn class_name_to_relative_path(class_name: &str) -> PathBuf {
    let mut path: PathBuf = class_name.split('/').collect();
    path.set_extension(CLASS_EXTENSION);
    path
}
