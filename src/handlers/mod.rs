// src/handlers/mod.rs

pub mod auth;
pub mod community;
pub mod health;
pub mod interaction;
pub mod post;
pub mod profile;
