pub mod fingerprint;
pub mod handlers;
pub mod orchestrator;
pub mod parser;
pub mod prompts;
