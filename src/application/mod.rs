// src/application/mod.rs
pub mod dto;
pub mod realtime;
pub mod service;
