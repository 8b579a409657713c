// src/models/mod.rs

pub mod achievement;
pub mod attempt;
pub mod certificate;
pub mod course;
pub mod quiz;
pub mod user;
