pub mod error;
pub mod time;
pub mod value;

pub use error::{GraphError, GraphErrorKind};
pub use time::EngineTime;
pub use value::ScalarValue;
