//! Domain core for the MCQ generation pipeline: types, configuration,
//! error taxonomy, and the pure algorithms (chunking, quota allocation,
//! batch validation) that the other crates build on.

pub mod chunker;
pub mod config;
pub mod error;
pub mod quota;
pub mod text;
pub mod traits;
pub mod types;
pub mod validator;

pub use error::{Error, Result};
