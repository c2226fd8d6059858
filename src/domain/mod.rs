pub mod listing;
pub mod moderation;
pub mod notification;
