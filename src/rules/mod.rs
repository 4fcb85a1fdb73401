//! Alert rule file model
//!
//! The codec renders and recognises single rule fragments; the document holds
//! a whole parsed rule file.

pub mod codec;
pub mod document;

pub use codec::{decode_key, strip, RuleTemplate, FILE_HEADER};
pub use document::{Applied, Fragment, RuleDocument};
