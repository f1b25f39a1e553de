pub mod attempts;
pub mod catalog;
pub mod core;
pub mod leaderboard;
pub mod performance;
