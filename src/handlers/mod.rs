// src/handlers/mod.rs

pub mod attempt;
pub mod submission;
