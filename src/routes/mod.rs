pub mod auth;
pub mod credentials;
pub mod health;
pub mod logs;
pub mod webhooks;
pub mod workflows;
