pub mod address;
pub mod catalog;
pub mod config;
pub mod db;
pub mod duplicate;
pub mod environment;
pub mod errors;
pub mod generation;
pub mod language;
pub mod listing;
pub mod llm;
pub mod normalization;
pub mod prompts;
pub mod similarity;
