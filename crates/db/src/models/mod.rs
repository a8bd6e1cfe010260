pub mod area;
pub mod category;
pub mod domain;
pub mod firing_period;
pub mod firing_schedule;
pub mod message;
pub mod setting;
