pub mod answer;
pub mod attachment;
pub mod authentication;
pub mod comment;
pub mod question;
pub mod user;
pub mod vote;
