pub mod health;
pub mod media_queue;
