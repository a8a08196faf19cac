use graft_classfile::ClassFile;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// File extension of class images in a directory-backed pool.
pub const IMAGE_EXTENSION: &str = "gcls";

/// Resolves a class name to its current binary image. Implementations must be
/// safe for concurrent reads; the engine never writes through this boundary.
pub trait ClassPool {
    fn class_bytes(&self, name: &str) -> Option<Vec<u8>>;
}

impl<P: ClassPool + ?Sized> ClassPool for &P {
    fn class_bytes(&self, name: &str) -> Option<Vec<u8>> {
        (**self).class_bytes(name)
    }
}

/// In-memory pool for unit tests and embedders that manage bytes themselves.
#[derive(Debug, Default)]
pub struct MemoryClassPool {
    classes: HashMap<String, Vec<u8>>,
}

impl MemoryClassPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.classes.insert(name.into(), bytes);
    }

    /// Encodes and registers a decoded class under its own name.
    pub fn insert_class(&mut self, class: &ClassFile) -> graft_classfile::Result<()> {
        let bytes = class.encode()?;
        self.insert(class.name.clone(), bytes);
        Ok(())
    }
}

impl ClassPool for MemoryClassPool {
    fn class_bytes(&self, name: &str) -> Option<Vec<u8>> {
        self.classes.get(name).cloned()
    }
}

/// Pool backed by a directory tree: `a.b.C` resolves to `<root>/a/b/C.gcls`.
#[derive(Debug)]
pub struct DirClassPool {
    root: PathBuf,
}

impl DirClassPool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn image_path(&self, name: &str) -> PathBuf {
        let mut path = self.root.clone();
        for part in name.split('.') {
            path.push(part);
        }
        path.set_extension(IMAGE_EXTENSION);
        path
    }

    /// Names of every class image under the root, in sorted order.
    pub fn class_names(&self) -> Vec<String> {
        let mut names: Vec<String> = walkdir::WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| dotted_name(&self.root, entry.path()))
            .collect();
        names.sort();
        names
    }
}

fn dotted_name(root: &Path, path: &Path) -> Option<String> {
    if path.extension()?.to_str()? != IMAGE_EXTENSION {
        return None;
    }
    let relative = path.strip_prefix(root).ok()?.with_extension("");
    let mut parts = Vec::new();
    for component in relative.components() {
        parts.push(component.as_os_str().to_str()?.to_string());
    }
    Some(parts.join("."))
}

impl ClassPool for DirClassPool {
    fn class_bytes(&self, name: &str) -> Option<Vec<u8>> {
        std::fs::read(self.image_path(name)).ok()
    }
}
