pub mod attachment;
pub mod answer;
pub mod comment;
pub mod document;
pub mod pagination;
pub mod question;
pub mod target;
pub mod user;
pub mod vote;
