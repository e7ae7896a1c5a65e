//! Auth-domain identifiers, verification secrets, and token records.

pub mod id;
pub mod token;

pub use id::*;
pub use token::{hash::*, purpose::*, record::*, secret::*};
