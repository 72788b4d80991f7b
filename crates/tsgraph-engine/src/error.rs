pub use tsgraph_common::{GraphError, GraphErrorKind};

pub type GraphResult<T> = Result<T, GraphError>;
