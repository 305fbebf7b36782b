//! Progress reporting for long-running archive operations

/// Phase of an archive operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpPhase {
    /// Reading the archive entry table
    ReadingTable,
    /// Building the in-memory tree
    LoadingTree,
    /// Detecting file types / loading previews
    Initializing,
    /// Writing files to disk (export)
    Exporting,
    /// Converting a file between formats
    Converting,
    /// Replacing entries from disk (import)
    Importing,
    /// Adding new files to the tree
    AddingFiles,
    /// Serializing the tree to the temporary archive
    Serializing,
    /// Swapping the rewritten archive into place
    Finalizing,
    /// Reloading the tree from the rewritten archive
    Reloading,
    /// Operation complete
    Complete,
}

impl OpPhase {
    /// Get a human-readable description of this phase
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReadingTable => "Reading entry table",
            Self::LoadingTree => "Loading tree",
            Self::Initializing => "Initializing files",
            Self::Exporting => "Exporting files",
            Self::Converting => "Converting",
            Self::Importing => "Importing files",
            Self::AddingFiles => "Adding files",
            Self::Serializing => "Serializing archive",
            Self::Finalizing => "Finalizing",
            Self::Reloading => "Reloading tree",
            Self::Complete => "Complete",
        }
    }
}

/// Progress information during archive operations
#[derive(Debug, Clone)]
pub struct OpProgress {
    /// Current operation phase
    pub phase: OpPhase,
    /// Current item number (1-indexed)
    pub current: usize,
    /// Total number of items
    pub total: usize,
    /// Current file being processed (if applicable)
    pub current_file: Option<String>,
}

impl OpProgress {
    /// Create a new progress update
    #[must_use]
    pub fn new(phase: OpPhase, current: usize, total: usize) -> Self {
        Self {
            phase,
            current,
            total,
            current_file: None,
        }
    }

    /// Create a progress update with a file/item name
    #[must_use]
    pub fn with_file(
        phase: OpPhase,
        current: usize,
        total: usize,
        file: impl Into<String>,
    ) -> Self {
        Self {
            phase,
            current,
            total,
            current_file: Some(file.into()),
        }
    }

    /// Get the progress percentage (0.0 - 1.0)
    #[must_use]
    pub fn percentage(&self) -> f32 {
        if self.total == 0 {
            1.0
        } else {
            self.current as f32 / self.total as f32
        }
    }
}

/// Progress callback type
pub type ProgressCallback<'a> = &'a (dyn Fn(&OpProgress) + Send + Sync);

fn ignore(_: &OpProgress) {}

/// A callback that ignores all progress updates
#[must_use]
pub fn silent() -> ProgressCallback<'static> {
    &ignore
}
