pub mod analytics;
pub mod job;
pub mod verification;
pub mod view;
