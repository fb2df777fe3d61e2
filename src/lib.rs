//! Rate-gated PID feedback controller.
//!
//! A host application (game AI steering, actuator loop, simulation) owns
//! one [`Pid`] per controlled axis and drives it every frame through
//! [`Pid::tick_if_enabled`], or directly through [`Pid::update`]. See
//! `demos/steering.rs` for a complete loop.

pub mod pid;

pub use pid::{Pid, PidBuilder};
