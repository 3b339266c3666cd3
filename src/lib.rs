pub mod commands;
pub mod db;
pub mod error;
pub mod models;
pub mod render;
pub mod services;
pub mod utils;

#[cfg(test)]
mod tests;
