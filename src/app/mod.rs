pub mod fanout;
pub mod listings;
pub mod moderation;
pub mod notifications;
