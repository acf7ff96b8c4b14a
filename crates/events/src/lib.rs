//! Event schema layer — the five raw record types captured per request, the
//! daily rollup record, and the record-store abstraction they live behind.

pub mod rollup;
pub mod store;
pub mod types;

pub use rollup::{DailyBreakdown, DailyMetrics, MetricSet, PageCount, SearchCount};
pub use store::{
    memory_store, AnalyticsStore, FailingStore, MemoryStore, RecordCounts, SessionInsert,
};
pub use types::{
    BusinessEvent, BusinessEventDetails, BusinessEventType, DeviceInfo, DeviceType, Interaction,
    InteractionCategory, PageView, PerformanceMetric, PerfTimings, Session,
};
