pub mod callback_server;
pub mod google_auth;
pub mod google_calendar;
pub mod ollama_client;
