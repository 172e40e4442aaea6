//! Stack snapshots
//!
//! Only the resident process owns the stack region of machine memory. When a
//! process is switched out, the words between its sp and the top of memory
//! are captured as a [`StackSnapshot`] and handed to a [`StackStore`]; when it
//! is switched back in, the snapshot is replayed and discarded.
//!
//! Snapshot order is top to bottom: the first word lives at the top of
//! memory, the last word is the most recently pushed.

use core_types::{MemoryError, SharedMemory, Word};
use kernel_api::KernelError;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Saved stack contents of one process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackSnapshot {
    words: Vec<Word>,
}

impl StackSnapshot {
    pub fn new(words: Vec<Word>) -> Self {
        Self { words }
    }

    /// Captures the words above `sp`, from `top` downward
    pub fn capture(memory: &SharedMemory, sp: usize, top: usize) -> Result<Self, MemoryError> {
        let mut words = Vec::with_capacity(top.saturating_sub(sp));
        let mut address = top;
        while address > sp {
            words.push(memory.read(address)?);
            address -= 1;
        }
        Ok(Self { words })
    }

    /// Writes the words back from `top` downward and returns the restored sp
    pub fn replay(&self, memory: &mut SharedMemory, top: usize) -> Result<usize, MemoryError> {
        if self.words.len() > top {
            return Err(MemoryError::InvalidAddress {
                address: top.wrapping_sub(self.words.len()),
                size: memory.size(),
            });
        }
        for (depth, word) in self.words.iter().enumerate() {
            memory.write(top - depth, *word)?;
        }
        Ok(top - self.words.len())
    }

    pub fn words(&self) -> &[Word] {
        &self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// One decimal word per line
    pub fn to_text(&self) -> String {
        self.words.iter().map(|word| format!("{}\n", word)).collect()
    }

    pub fn from_text(text: &str) -> Result<Self, String> {
        text.split_whitespace()
            .map(|token| {
                token
                    .parse::<Word>()
                    .map_err(|_| format!("invalid stack word '{}'", token))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self::new)
    }
}

/// Where switched-out stacks are kept, keyed by process name
pub trait StackStore {
    fn save(&mut self, name: &str, snapshot: &StackSnapshot) -> Result<(), KernelError>;

    /// Returns the saved snapshot, if any
    fn restore(&mut self, name: &str) -> Result<Option<StackSnapshot>, KernelError>;

    /// Forgets the saved snapshot; a missing snapshot is not an error
    fn discard(&mut self, name: &str) -> Result<(), KernelError>;
}

/// Keeps snapshots in memory
///
/// Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStackStore {
    snapshots: Rc<RefCell<HashMap<String, StackSnapshot>>>,
}

impl MemoryStackStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<StackSnapshot> {
        self.snapshots.borrow().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.snapshots.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.borrow().is_empty()
    }
}

impl StackStore for MemoryStackStore {
    fn save(&mut self, name: &str, snapshot: &StackSnapshot) -> Result<(), KernelError> {
        self.snapshots
            .borrow_mut()
            .insert(name.to_string(), snapshot.clone());
        Ok(())
    }

    fn restore(&mut self, name: &str) -> Result<Option<StackSnapshot>, KernelError> {
        Ok(self.get(name))
    }

    fn discard(&mut self, name: &str) -> Result<(), KernelError> {
        self.snapshots.borrow_mut().remove(name);
        Ok(())
    }
}

/// Keeps snapshots in `<root>/<name>/<name>.st`
#[derive(Debug, Clone)]
pub struct FileStackStore {
    root: PathBuf,
}

impl FileStackStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name).join(format!("{}.st", name))
    }
}

fn store_error(path: &Path, err: impl std::fmt::Display) -> KernelError {
    KernelError::StackStore(format!("{}: {}", path.display(), err))
}

impl StackStore for FileStackStore {
    fn save(&mut self, name: &str, snapshot: &StackSnapshot) -> Result<(), KernelError> {
        let path = self.path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| store_error(parent, e))?;
        }
        fs::write(&path, snapshot.to_text()).map_err(|e| store_error(&path, e))
    }

    fn restore(&mut self, name: &str) -> Result<Option<StackSnapshot>, KernelError> {
        let path = self.path(name);
        match fs::read_to_string(&path) {
            Ok(text) => StackSnapshot::from_text(&text)
                .map(Some)
                .map_err(|e| store_error(&path, e)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(store_error(&path, e)),
        }
    }

    fn discard(&mut self, name: &str) -> Result<(), KernelError> {
        let path = self.path(name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(store_error(&path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_reads_top_down() {
        let mut memory = SharedMemory::new(16);
        memory.write(15, 1).unwrap();
        memory.write(14, 2).unwrap();
        memory.write(13, 3).unwrap();

        let snapshot = StackSnapshot::capture(&memory, 12, 15).unwrap();
        assert_eq!(snapshot.words(), &[1, 2, 3]);

        let empty = StackSnapshot::capture(&memory, 15, 15).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_replay_restores_words_and_sp() {
        let mut memory = SharedMemory::new(16);
        let snapshot = StackSnapshot::new(vec![4, 5]);

        let sp = snapshot.replay(&mut memory, 15).unwrap();
        assert_eq!(sp, 13);
        assert_eq!(memory.read(15), Ok(4));
        assert_eq!(memory.read(14), Ok(5));
        assert_eq!(StackSnapshot::capture(&memory, sp, 15).unwrap(), snapshot);
    }

    #[test]
    fn test_replay_rejects_oversized_snapshot() {
        let mut memory = SharedMemory::new(4);
        let snapshot = StackSnapshot::new(vec![0; 5]);
        assert!(snapshot.replay(&mut memory, 3).is_err());
    }

    #[test]
    fn test_text_form() {
        let snapshot = StackSnapshot::new(vec![7, -2, 40]);
        assert_eq!(snapshot.to_text(), "7\n-2\n40\n");
        assert_eq!(StackSnapshot::from_text("7\n-2\n40\n").unwrap(), snapshot);
        assert!(StackSnapshot::from_text("7\nx\n").is_err());
    }

    #[test]
    fn test_memory_store_clones_share_state() {
        let store = MemoryStackStore::new();
        let mut handle = store.clone();

        handle.save("a", &StackSnapshot::new(vec![1])).unwrap();
        assert_eq!(store.get("a"), Some(StackSnapshot::new(vec![1])));

        handle.discard("a").unwrap();
        handle.discard("a").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStackStore::new(dir.path());

        assert_eq!(store.restore("calc").unwrap(), None);

        let snapshot = StackSnapshot::new(vec![3, 2, 1]);
        store.save("calc", &snapshot).unwrap();
        let path = dir.path().join("calc").join("calc.st");
        assert!(path.exists());
        assert_eq!(store.restore("calc").unwrap(), Some(snapshot));

        store.discard("calc").unwrap();
        assert!(!path.exists());
        store.discard("calc").unwrap();
    }
}
