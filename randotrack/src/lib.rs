pub mod autotrack;
pub mod provider;
pub mod requirement;
pub mod section;
pub mod settings;
