pub mod historical;
pub mod schedule_store;
pub mod snapshot_store;

pub use historical::HistoricalReadingStore;
pub use schedule_store::{Scenario, ScheduleEntry, ScheduleStore};
pub use snapshot_store::{
    analyze_deviation, DeviationKind, DeviationReport, PredictionSnapshot, PrimaryCause,
    SnapshotStore,
};
