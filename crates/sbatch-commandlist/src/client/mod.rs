pub mod output;
pub mod submit;
pub mod utils;
