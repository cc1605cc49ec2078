//! Background services
//!
//! - **DailySummaryJob**: recomputes one day's means from the time-series store
//! - **DailySummaryScheduler**: runs the job for the previous day at a fixed
//!   UTC time until shutdown

pub mod daily_summary;

pub use daily_summary::{
    parse_schedule, previous_day, DailyAverages, DailySummaryJob, DailySummaryScheduler,
};
