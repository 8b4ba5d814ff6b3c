//! Conversation domain: services, session controller and the answering collaborator.

pub mod assistant;
pub mod error;
pub mod services;
pub mod session;
pub mod title;
pub mod traits;
pub mod types;
