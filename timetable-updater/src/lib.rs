//! Realtime timetable updater.
//!
//! Applies realtime trip updates (delays, skipped stops, cancellations
//! and trips the static schedule never had) on top of a static transit
//! schedule, and publishes the result as immutable snapshots that routing
//! threads read without blocking the writer.

pub mod domain;
pub mod periodic;
pub mod schedule;
pub mod timetable;
pub mod trip_times;
pub mod update;
pub mod updater;
