//! Search scopes: opaque predicates over file ids

use crate::container::FileId;
use ahash::AHashSet;

/// Decides which files a query may see
pub trait SearchScope {
    fn contains(&self, file: FileId) -> bool;
}

/// Every file
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalScope;

impl SearchScope for GlobalScope {
    fn contains(&self, _file: FileId) -> bool {
        true
    }
}

/// An explicit set of files
#[derive(Debug, Clone, Default)]
pub struct FileSetScope {
    files: AHashSet<FileId>,
}

impl FileSetScope {
    pub fn new(files: impl IntoIterator<Item = FileId>) -> Self {
        Self {
            files: files.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FromIterator<FileId> for FileSetScope {
    fn from_iter<I: IntoIterator<Item = FileId>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl SearchScope for FileSetScope {
    fn contains(&self, file: FileId) -> bool {
        self.files.contains(&file)
    }
}

impl<F: Fn(FileId) -> bool> SearchScope for F {
    fn contains(&self, file: FileId) -> bool {
        self(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scopes() {
        let file = FileId::new(7);
        assert!(GlobalScope.contains(file));

        let set: FileSetScope = [FileId::new(1), file].into_iter().collect();
        assert!(set.contains(file));
        assert!(!set.contains(FileId::new(2)));
        assert_eq!(set.len(), 2);

        let even = |file: FileId| file.as_raw() % 2 == 0;
        assert!(!SearchScope::contains(&even, file));
        assert!(SearchScope::contains(&even, FileId::new(8)));
    }
}
