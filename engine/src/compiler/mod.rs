//! Source text → compiled byte buffer, in two stages: [`parser`] produces a
//! flat [`ast::NodeList`], [`layout`] assigns byte offsets and serializes it.

pub mod ast;
pub mod layout;
pub mod parser;
