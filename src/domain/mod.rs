pub mod achievements;
pub mod models;
pub mod mood;
pub mod streak;
