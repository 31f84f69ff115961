use core::fmt;

use spin::Mutex;

/// Boot phases tracked at once; there is no heap to grow into.
pub const MAX_COMPONENTS: usize = 8;

/// Kernel initialization status tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStatus {
    NotStarted,
    InProgress,
    Completed,
    Failed(&'static str),
}

impl InitStatus {
    pub const fn label(&self) -> &'static str {
        match self {
            InitStatus::NotStarted => "Not Started",
            InitStatus::InProgress => "In Progress",
            InitStatus::Completed => "Completed",
            InitStatus::Failed(_) => "Failed",
        }
    }
}

impl fmt::Display for InitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitStatus::Failed(err) => write!(f, "Failed: {}", err),
            other => f.write_str(other.label()),
        }
    }
}

/// Kernel component status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentStatus {
    pub name: &'static str,
    pub status: InitStatus,
}

impl ComponentStatus {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            status: InitStatus::NotStarted,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.status, InitStatus::Completed)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, InitStatus::Failed(_))
    }
}

pub struct StatusTable {
    entries: [Option<ComponentStatus>; MAX_COMPONENTS],
    len: usize,
}

impl StatusTable {
    pub const fn new() -> Self {
        Self {
            entries: [None; MAX_COMPONENTS],
            len: 0,
        }
    }

    /// Registering a name twice is a no-op.
    pub fn register(&mut self, name: &'static str) -> Result<(), &'static str> {
        if self.find(name).is_some() {
            return Ok(());
        }
        if self.len == MAX_COMPONENTS {
            return Err("component status table is full");
        }
        self.entries[self.len] = Some(ComponentStatus::new(name));
        self.len += 1;
        Ok(())
    }

    /// Unknown names are ignored.
    pub fn update(&mut self, name: &'static str, status: InitStatus) {
        if let Some(index) = self.find(name) {
            if let Some(entry) = self.entries[index].as_mut() {
                entry.status = status;
            }
        }
    }

    pub fn status(&self, name: &str) -> Option<InitStatus> {
        self.iter().find(|c| c.name == name).map(|c| c.status)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ComponentStatus> {
        self.entries[..self.len].iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn all_ready(&self) -> bool {
        !self.is_empty() && self.iter().all(ComponentStatus::is_complete)
    }

    fn find(&self, name: &str) -> Option<usize> {
        self.iter().position(|c| c.name == name)
    }
}

impl Default for StatusTable {
    fn default() -> Self {
        Self::new()
    }
}

static INIT_STATUS: Mutex<StatusTable> = Mutex::new(StatusTable::new());

/// The kernel-wide table `init_phase` reports into.
pub fn table() -> &'static Mutex<StatusTable> {
    &INIT_STATUS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_update() {
        let mut table = StatusTable::new();
        assert!(!table.all_ready());
        table.register("GDT").unwrap();
        table.register("Terminal").unwrap();
        table.register("GDT").unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.status("GDT"), Some(InitStatus::NotStarted));

        table.update("GDT", InitStatus::Completed);
        table.update("Nope", InitStatus::Completed);
        assert!(!table.all_ready());

        table.update("Terminal", InitStatus::Completed);
        assert!(table.all_ready());
        assert_eq!(table.status("Nope"), None);
    }

    #[test]
    fn test_table_is_bounded() {
        const NAMES: [&str; MAX_COMPONENTS] = ["a", "b", "c", "d", "e", "f", "g", "h"];
        let mut table = StatusTable::new();
        for name in NAMES {
            table.register(name).unwrap();
        }
        assert_eq!(table.register("one too many"), Err("component status table is full"));
        assert_eq!(table.iter().map(|c| c.name).collect::<Vec<_>>(), NAMES);
    }

    #[test]
    fn test_status_text() {
        assert_eq!(InitStatus::InProgress.to_string(), "In Progress");
        assert_eq!(InitStatus::Failed("no GDT").to_string(), "Failed: no GDT");
        assert_eq!(InitStatus::Failed("no GDT").label(), "Failed");
        let failed = ComponentStatus {
            name: "Serial",
            status: InitStatus::Failed("x"),
        };
        assert!(failed.is_failed() && !failed.is_complete());
    }
}
