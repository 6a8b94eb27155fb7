pub mod generator_service;
pub mod publisher;
pub mod resolver;
pub mod scheduler;
