// src/lib.rs

// Host side driver for the OAMS filament spool management board.

pub mod configfile;
pub mod core_traits;
pub mod gcode;
pub mod mcu;
pub mod msgproto;

pub mod extras;
