use super::domain::Defect;

/// Append-only defect collector
///
/// Written from every evaluator thread; implementations serialize writes.
pub trait DefectSink: Send + Sync {
    fn record(&self, defect: Defect);
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DefectSink for NullSink {
    fn record(&self, _defect: Defect) {}
}
