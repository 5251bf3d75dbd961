// Text-level guards applied to every generated or user-supplied statement
// before it is allowed anywhere near the database.
pub mod normalizer;
pub mod validator;

pub use normalizer::normalize_identifiers;
pub use validator::{validate_query, Verdict};
