pub mod config;
pub mod detect;
pub mod engine;
pub mod narrator;
pub mod player;
pub mod speaker;
pub mod story;
pub mod text;
pub mod voices;
