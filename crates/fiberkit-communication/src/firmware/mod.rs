//! Firmware dialects. Only Marlin-derived printer boards are driven.

pub mod marlin;
