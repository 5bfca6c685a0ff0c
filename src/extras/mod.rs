// src/extras/mod.rs
// Optional printer modules, each configured from its own config section.

pub mod oams;
