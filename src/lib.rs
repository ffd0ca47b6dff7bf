pub mod catalog;
pub mod clean;
pub mod config;
pub mod crowd;
pub mod danceability;
pub mod deezer;
pub mod runnability;
pub mod store;
pub mod verify;

/// Application name for XDG paths
pub const APP_NAME: &str = "paceline";
