//! Owned event values, used where listener calls are turned into messages.
use std::fmt;

use super::DiskInfo;

/// The five listener slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiskEventKind {
    Appeared,
    Disappeared,
    DescriptionChanged,
    Mounted,
    Unmounted,
}

impl DiskEventKind {
    /// Short label for log lines and terminal output.
    pub fn label(self) -> &'static str {
        match self {
            Self::Appeared => "appeared",
            Self::Disappeared => "disappeared",
            Self::DescriptionChanged => "changed",
            Self::Mounted => "mounted",
            Self::Unmounted => "unmounted",
        }
    }
}

impl fmt::Display for DiskEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A listener call captured as a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiskEvent {
    Appeared(DiskInfo),
    Disappeared(DiskInfo),
    DescriptionChanged(DiskInfo),
    Mounted(DiskInfo),
    Unmounted(DiskInfo),
}

impl DiskEvent {
    pub fn kind(&self) -> DiskEventKind {
        match self {
            Self::Appeared(_) => DiskEventKind::Appeared,
            Self::Disappeared(_) => DiskEventKind::Disappeared,
            Self::DescriptionChanged(_) => DiskEventKind::DescriptionChanged,
            Self::Mounted(_) => DiskEventKind::Mounted,
            Self::Unmounted(_) => DiskEventKind::Unmounted,
        }
    }

    pub fn disk(&self) -> &DiskInfo {
        match self {
            Self::Appeared(d)
            | Self::Disappeared(d)
            | Self::DescriptionChanged(d)
            | Self::Mounted(d)
            | Self::Unmounted(d) => d,
        }
    }

    pub fn into_disk(self) -> DiskInfo {
        match self {
            Self::Appeared(d)
            | Self::Disappeared(d)
            | Self::DescriptionChanged(d)
            | Self::Mounted(d)
            | Self::Unmounted(d) => d,
        }
    }
}
