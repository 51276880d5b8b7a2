mod extract;
mod sanitize;

pub use extract::extract_json;
pub use sanitize::sanitize;
