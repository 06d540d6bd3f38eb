pub mod outcome;
pub mod question;
pub mod resume;
pub mod search_params;
pub mod text;
pub mod vacancy;
