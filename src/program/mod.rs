//! Block programs
//!
//! - `node`: the program tree model
//! - `fields`: typed access to raw node fields
//! - `library`: built-in example programs
//! - `store`: named program slots on disk

pub mod fields;
pub mod library;
pub mod node;
pub mod store;

pub use node::{chain, FieldValue, NodeKind, Program, ProgramNode};
pub use store::ProgramStore;
