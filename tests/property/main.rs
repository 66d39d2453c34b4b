// tests/property/main.rs

mod log_bound;
mod supervisor_core;
