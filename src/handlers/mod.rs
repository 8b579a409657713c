// src/handlers/mod.rs

pub mod achievement;
pub mod admin;
pub mod attempt;
pub mod certificate;
pub mod course;
pub mod quiz;
