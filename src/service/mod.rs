pub mod news;
pub mod oauth;
pub mod patient;
pub mod tracking;
