pub mod answerer;
pub mod authenticator;
pub mod bot;
pub mod chat_model;
pub mod droid;
pub mod hh_site;
pub mod job_manager;
pub mod llm_client;
pub mod pause;
pub mod prompts;
pub mod resume_generator;
pub mod site;

pub use answerer::*;
pub use authenticator::*;
pub use bot::*;
pub use chat_model::*;
pub use droid::*;
pub use hh_site::*;
pub use job_manager::*;
pub use llm_client::*;
pub use resume_generator::*;
pub use site::*;
