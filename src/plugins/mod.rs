//! Plugins shipped with sortling.

pub mod webp_to_png;
