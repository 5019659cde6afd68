//! Timing, judgement and scoring core for a four-player beatline rhythm game.
//!
//! A round is driven by [`game::gameplay::update`] once per frame and
//! [`game::gameplay::handle_input`] per pad event; both return the events the
//! caller should react to.

pub mod config;
pub mod core;
pub mod game;
