//! In-memory archive tree
//!
//! Directories and file entries live in a generational arena owned by the
//! session; nodes address each other through `DirId`/`FileId` indices, so
//! parent back-references are plain fields and node identity is stable for
//! as long as the node exists. Ids are never reused within a load cycle and
//! all ids go stale when the tree is rebuilt after a repack.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::codec::EntryHandle;
use crate::error::{Error, Result};
use crate::filetype::{FileFormat, FileTypeDescriptor};

/// Stable id of a directory node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DirId {
    index: u32,
    generation: u32,
}

/// Stable id of a file entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId {
    index: u32,
    generation: u32,
}

/// One directory: a single path segment plus its children
#[derive(Debug)]
pub struct DirectoryNode {
    pub(crate) name: String,
    pub(crate) parent: Option<DirId>,
    /// Child directories keyed by lowercased name, insertion-ordered
    pub(crate) children: IndexMap<String, DirId>,
    /// File entries in archive order
    pub(crate) files: Vec<FileId>,
}

impl DirectoryNode {
    /// The directory's own path segment (empty for the root)
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this is the archive root
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Parent directory id, `None` for the root
    #[must_use]
    pub fn parent(&self) -> Option<DirId> {
        self.parent
    }

    /// Child directory ids in insertion order
    pub fn child_dirs(&self) -> impl Iterator<Item = DirId> + '_ {
        self.children.values().copied()
    }

    /// File entry ids in archive order
    #[must_use]
    pub fn files(&self) -> &[FileId] {
        &self.files
    }
}

/// One file entry: name, codec handle and session-local edit state
pub struct FileEntry {
    pub(crate) name: String,
    pub(crate) parent: DirId,
    pub(crate) handle: EntryHandle,
    /// Replacement bytes queued for the next repack
    pub(crate) pending: Option<Vec<u8>>,
    /// Descriptor chosen at initialization; dropped when bytes are replaced
    pub(crate) descriptor: Option<Arc<dyn FileTypeDescriptor>>,
    pub(crate) export_formats: Vec<FileFormat>,
    pub(crate) import_formats: Vec<FileFormat>,
    pub(crate) selected: bool,
}

impl FileEntry {
    pub(crate) fn new(name: impl Into<String>, parent: DirId, handle: EntryHandle) -> Self {
        Self {
            name: name.into(),
            parent,
            handle,
            pending: None,
            descriptor: None,
            export_formats: Vec::new(),
            import_formats: Vec::new(),
            selected: false,
        }
    }

    /// File name within its directory
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Owning directory id
    #[must_use]
    pub fn parent(&self) -> DirId {
        self.parent
    }

    /// Whether replacement bytes are queued for the next repack
    #[must_use]
    pub fn is_modified(&self) -> bool {
        self.pending.is_some()
    }

    /// Whether the entry is selected
    #[must_use]
    pub fn is_selected(&self) -> bool {
        self.selected
    }

    /// The descriptor chosen at initialization, if any
    #[must_use]
    pub fn descriptor(&self) -> Option<&Arc<dyn FileTypeDescriptor>> {
        self.descriptor.as_ref()
    }

    /// Codec handle for the entry
    #[must_use]
    pub fn handle(&self) -> &EntryHandle {
        &self.handle
    }
}

impl std::fmt::Debug for FileEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileEntry")
            .field("name", &self.name)
            .field("modified", &self.pending.is_some())
            .field("selected", &self.selected)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Arena of directories and file entries for one open archive
pub struct ArchiveTree {
    dirs: Vec<Slot<DirectoryNode>>,
    files: Vec<Slot<FileEntry>>,
    free_dirs: Vec<u32>,
    free_files: Vec<u32>,
    root: DirId,
    separator: char,
}

impl ArchiveTree {
    /// Create a tree containing only an empty root
    #[must_use]
    pub fn new(separator: char) -> Self {
        let root_node = DirectoryNode {
            name: String::new(),
            parent: None,
            children: IndexMap::new(),
            files: Vec::new(),
        };
        Self {
            dirs: vec![Slot {
                generation: 0,
                value: Some(root_node),
            }],
            files: Vec::new(),
            free_dirs: Vec::new(),
            free_files: Vec::new(),
            root: DirId {
                index: 0,
                generation: 0,
            },
            separator,
        }
    }

    /// The root directory id
    #[must_use]
    pub fn root(&self) -> DirId {
        self.root
    }

    /// The archive's path separator
    #[must_use]
    pub fn separator(&self) -> char {
        self.separator
    }

    /// Borrow a directory node
    ///
    /// # Errors
    /// Returns [`Error::StaleId`] if the node was removed or the tree was
    /// rebuilt.
    pub fn dir(&self, id: DirId) -> Result<&DirectoryNode> {
        self.dirs
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.value.as_ref())
            .ok_or(Error::StaleId)
    }

    pub(crate) fn dir_mut(&mut self, id: DirId) -> Result<&mut DirectoryNode> {
        self.dirs
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.value.as_mut())
            .ok_or(Error::StaleId)
    }

    /// Borrow a file entry
    ///
    /// # Errors
    /// Returns [`Error::StaleId`] if the entry was removed or the tree was
    /// rebuilt.
    pub fn file(&self, id: FileId) -> Result<&FileEntry> {
        self.files
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.value.as_ref())
            .ok_or(Error::StaleId)
    }

    pub(crate) fn file_mut(&mut self, id: FileId) -> Result<&mut FileEntry> {
        self.files
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.value.as_mut())
            .ok_or(Error::StaleId)
    }

    /// Find a child directory by name, case-insensitive
    #[must_use]
    pub fn find_child(&self, parent: DirId, name: &str) -> Option<DirId> {
        self.dir(parent)
            .ok()?
            .children
            .get(&name.to_lowercase())
            .copied()
    }

    /// Find a file in a directory by name, case-insensitive
    #[must_use]
    pub fn find_file(&self, parent: DirId, name: &str) -> Option<FileId> {
        let needle = name.to_lowercase();
        self.dir(parent)
            .ok()?
            .files
            .iter()
            .copied()
            .find(|id| {
                self.file(*id)
                    .is_ok_and(|f| f.name.to_lowercase() == needle)
            })
    }

    /// Create a child directory
    ///
    /// # Errors
    /// Returns [`Error::NameConflict`] if a sibling directory with the same
    /// name (any casing) exists, [`Error::StaleId`] for a stale parent.
    pub fn add_directory(&mut self, parent: DirId, name: &str) -> Result<DirId> {
        let key = name.to_lowercase();
        let parent_node = self.dir(parent)?;
        if parent_node.children.contains_key(&key) {
            return Err(Error::NameConflict {
                name: name.to_string(),
            });
        }

        let node = DirectoryNode {
            name: name.to_string(),
            parent: Some(parent),
            children: IndexMap::new(),
            files: Vec::new(),
        };
        let id = self.alloc_dir(node);
        self.dir_mut(parent)?.children.insert(key, id);
        Ok(id)
    }

    /// Detach a directory and recursively dispose its subtree.
    ///
    /// Returns the ids of every file entry that was removed, so callers can
    /// invalidate caches keyed on them.
    ///
    /// # Errors
    /// Returns [`Error::StaleId`] for a stale id. The root cannot be removed
    /// here; callers decide root semantics.
    pub fn remove_directory(&mut self, id: DirId) -> Result<Vec<FileId>> {
        let node = self.dir(id)?;
        let Some(parent) = node.parent else {
            return Err(Error::StaleId);
        };
        let key = node.name.to_lowercase();
        self.dir_mut(parent)?.children.shift_remove(&key);

        let mut removed = Vec::new();
        self.dispose_subtree(id, &mut removed);
        Ok(removed)
    }

    fn dispose_subtree(&mut self, id: DirId, removed: &mut Vec<FileId>) {
        let (children, files) = {
            let Ok(node) = self.dir(id) else { return };
            (
                node.children.values().copied().collect::<Vec<_>>(),
                node.files.clone(),
            )
        };

        for child in children {
            self.dispose_subtree(child, removed);
        }
        for file in files {
            self.free_file(file);
            removed.push(file);
        }
        self.free_dir(id);
    }

    /// Append a file entry to a directory
    ///
    /// # Errors
    /// Returns [`Error::NameConflict`] on a case-insensitive name collision.
    pub fn attach_file(&mut self, parent: DirId, entry: FileEntry) -> Result<FileId> {
        let position = self.dir(parent)?.files.len();
        self.insert_file_at(parent, entry, position)
    }

    /// Insert a file entry at a specific position in a directory
    ///
    /// # Errors
    /// Returns [`Error::NameConflict`] on a case-insensitive name collision.
    pub fn insert_file_at(
        &mut self,
        parent: DirId,
        entry: FileEntry,
        position: usize,
    ) -> Result<FileId> {
        if self.find_file(parent, &entry.name).is_some() {
            return Err(Error::NameConflict { name: entry.name });
        }

        let id = self.alloc_file(entry);
        let node = self.dir_mut(parent)?;
        let position = position.min(node.files.len());
        node.files.insert(position, id);
        Ok(id)
    }

    /// Detach and dispose a file entry, releasing its pending buffer.
    ///
    /// Returns the entry's former position within its directory.
    ///
    /// # Errors
    /// Returns [`Error::StaleId`] for a stale id.
    pub fn remove_file(&mut self, id: FileId) -> Result<usize> {
        let parent = self.file(id)?.parent;
        let node = self.dir_mut(parent)?;
        let position = node
            .files
            .iter()
            .position(|f| *f == id)
            .ok_or(Error::StaleId)?;
        node.files.remove(position);
        self.free_file(id);
        Ok(position)
    }

    /// Full path of a directory, segments joined with the separator.
    /// The root's path is empty.
    #[must_use]
    pub fn dir_path(&self, id: DirId) -> String {
        let mut segments = Vec::new();
        let mut current = Some(id);
        while let Some(dir_id) = current {
            let Ok(node) = self.dir(dir_id) else { break };
            if !node.name.is_empty() {
                segments.push(node.name.clone());
            }
            current = node.parent;
        }
        segments.reverse();
        segments.join(&self.separator.to_string())
    }

    /// Full path of a file entry
    #[must_use]
    pub fn file_path(&self, id: FileId) -> String {
        let Ok(entry) = self.file(id) else {
            return String::new();
        };
        let dir_path = self.dir_path(entry.parent);
        if dir_path.is_empty() {
            entry.name.clone()
        } else {
            format!("{dir_path}{}{}", self.separator, entry.name)
        }
    }

    /// Walk or create directories for a separator-joined path.
    /// An empty path resolves to the root.
    ///
    /// # Errors
    /// Propagates [`Error::NameConflict`] if a segment collides while being
    /// created, which cannot happen for paths produced by this tree.
    pub fn ensure_path(&mut self, path: &str) -> Result<DirId> {
        let mut current = self.root;
        if path.is_empty() {
            return Ok(current);
        }
        for segment in path.split(self.separator).filter(|s| !s.is_empty()) {
            current = match self.find_child(current, segment) {
                Some(existing) => existing,
                None => self.add_directory(current, segment)?,
            };
        }
        Ok(current)
    }

    /// Resolve a separator-joined path to an existing directory
    #[must_use]
    pub fn resolve_path(&self, path: &str) -> Option<DirId> {
        let mut current = self.root;
        for segment in path.split(self.separator).filter(|s| !s.is_empty()) {
            current = self.find_child(current, segment)?;
        }
        Some(current)
    }

    /// Collect file ids under a directory, optionally recursing
    #[must_use]
    pub fn collect_files(&self, dir: DirId, recursive: bool) -> Vec<FileId> {
        let mut out = Vec::new();
        self.collect_files_into(dir, recursive, &mut out);
        out
    }

    fn collect_files_into(&self, dir: DirId, recursive: bool, out: &mut Vec<FileId>) {
        let Ok(node) = self.dir(dir) else { return };
        out.extend(node.files.iter().copied());
        if recursive {
            let children: Vec<DirId> = node.children.values().copied().collect();
            for child in children {
                self.collect_files_into(child, true, out);
            }
        }
    }

    /// Full paths of every file in the tree, in deterministic DFS order
    #[must_use]
    pub fn all_file_paths(&self) -> Vec<String> {
        self.collect_files(self.root, true)
            .into_iter()
            .map(|id| self.file_path(id))
            .collect()
    }

    /// Number of live file entries
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.files.iter().filter(|s| s.value.is_some()).count()
    }

    /// Dispose every entry and node, leaving only an empty root.
    ///
    /// Bumps every generation so outstanding ids go stale.
    pub fn clear(&mut self) {
        for slot in &mut self.dirs {
            if slot.value.take().is_some() {
                slot.generation += 1;
            }
        }
        for slot in &mut self.files {
            if slot.value.take().is_some() {
                slot.generation += 1;
            }
        }
        self.free_dirs = (0..self.dirs.len() as u32).rev().collect();
        self.free_files = (0..self.files.len() as u32).rev().collect();

        let root_node = DirectoryNode {
            name: String::new(),
            parent: None,
            children: IndexMap::new(),
            files: Vec::new(),
        };
        self.root = self.alloc_dir(root_node);
    }

    fn alloc_dir(&mut self, node: DirectoryNode) -> DirId {
        if let Some(index) = self.free_dirs.pop() {
            let slot = &mut self.dirs[index as usize];
            slot.value = Some(node);
            DirId {
                index,
                generation: slot.generation,
            }
        } else {
            self.dirs.push(Slot {
                generation: 0,
                value: Some(node),
            });
            DirId {
                index: (self.dirs.len() - 1) as u32,
                generation: 0,
            }
        }
    }

    fn alloc_file(&mut self, entry: FileEntry) -> FileId {
        if let Some(index) = self.free_files.pop() {
            let slot = &mut self.files[index as usize];
            slot.value = Some(entry);
            FileId {
                index,
                generation: slot.generation,
            }
        } else {
            self.files.push(Slot {
                generation: 0,
                value: Some(entry),
            });
            FileId {
                index: (self.files.len() - 1) as u32,
                generation: 0,
            }
        }
    }

    fn free_dir(&mut self, id: DirId) {
        if let Some(slot) = self.dirs.get_mut(id.index as usize)
            && slot.generation == id.generation
            && slot.value.take().is_some()
        {
            slot.generation += 1;
            self.free_dirs.push(id.index);
        }
    }

    fn free_file(&mut self, id: FileId) {
        if let Some(slot) = self.files.get_mut(id.index as usize)
            && slot.generation == id.generation
            && slot.value.take().is_some()
        {
            slot.generation += 1;
            self.free_files.push(id.index);
        }
    }
}

impl std::fmt::Debug for ArchiveTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveTree")
            .field("files", &self.file_count())
            .field("separator", &self.separator)
            .finish_non_exhaustive()
    }
}
