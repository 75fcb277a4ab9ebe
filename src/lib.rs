//! Scholar: a terminal AI tutor with quizzes, mind maps and a study memory.

pub mod artifacts;
pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod model;
pub mod state;
pub mod store;
pub mod tutor;
