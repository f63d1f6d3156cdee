pub mod tick_math;
pub mod tick_range;
pub mod amounts;
