pub mod json;
pub mod regex;
