pub mod message;
pub mod parsers;
pub mod sanitizer;

pub use message::{MailError, NewsletterMessage};
pub use parsers::{ParserRegistry, SourceParser};
pub use sanitizer::sanitize;
