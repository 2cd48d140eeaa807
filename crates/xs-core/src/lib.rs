pub mod command;
pub mod error;
pub mod parameter;
pub mod script;
pub mod syntax;
pub mod types;

pub use command::*;
pub use error::*;
pub use parameter::*;
pub use script::*;
pub use syntax::*;
pub use types::*;
