pub mod achievements;
pub mod capture;
pub mod catalog;
pub mod challenge;
pub mod config;
pub mod difficulty;
pub mod emotion;
pub mod orchestrator;
pub mod playback;
pub mod session;
pub mod signal;
pub mod util;
