pub mod prompt;
pub mod test_case;

pub use prompt::*;
pub use test_case::*;
