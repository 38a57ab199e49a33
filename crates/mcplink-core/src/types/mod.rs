//! Payload types for the tool, resource and prompt operations.

pub mod content;
pub mod prompt;
pub mod resource;
pub mod tool;

pub use content::*;
pub use prompt::*;
pub use resource::*;
pub use tool::*;
