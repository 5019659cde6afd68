pub mod beatline;
pub mod cpu;
pub mod gameplay;
pub mod judgment;
pub mod life;
pub mod notes;
pub mod profile;
pub mod scoring;
pub mod stage_stats;
pub mod timing;
pub mod timing_windows;
