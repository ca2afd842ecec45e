//! Sink implementations

use super::domain::{Defect, DefectKind};
use super::ports::DefectSink;
use parking_lot::Mutex;

/// Keeps every defect in arrival order
#[derive(Debug, Default)]
pub struct CollectingSink {
    defects: Mutex<Vec<Defect>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far
    pub fn defects(&self) -> Vec<Defect> {
        self.defects.lock().clone()
    }

    /// Drain the sink
    pub fn take(&self) -> Vec<Defect> {
        std::mem::take(&mut *self.defects.lock())
    }

    pub fn len(&self) -> usize {
        self.defects.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.defects.lock().is_empty()
    }

    pub fn count(&self, kind: DefectKind) -> usize {
        self.defects.lock().iter().filter(|d| d.kind == kind).count()
    }
}

impl DefectSink for CollectingSink {
    fn record(&self, defect: Defect) {
        self.defects.lock().push(defect);
    }
}

/// Logs each defect at `warn`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DefectSink for TracingSink {
    fn record(&self, defect: Defect) {
        tracing::warn!(
            kind = defect.kind.as_str(),
            site = %defect.site,
            "{}",
            defect.description
        );
    }
}
