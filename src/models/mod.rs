//! Timetabling domain model.
//!
//! - [`ScheduleRequest`]: classes with weekly slot rules plus global constraints
//! - [`WeightConfig`]: weights of the fitness terms
//! - [`Horizon`]: the dated week grid derived from a request
//! - [`ScheduleResponse`]: dated assignments plus run metadata

mod horizon;
mod request;
mod response;
mod weights;

pub use horizon::Horizon;
pub use request::{
    ClassId, ClassRequest, ConsecutiveRule, ScheduleConstraints, ScheduleRequest, TimeSlot,
    DAYS_PER_WEEK, PERIODS_PER_DAY,
};
pub use response::{
    GenerationStats, ScheduleAssignment, ScheduleMetadata, ScheduleResponse, Termination,
};
pub use weights::{WeightConfig, WeightKey};
