// src/lib.rs

//! Ontario dentist and clinic harvester library

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
