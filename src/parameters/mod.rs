//! The parameter system: named scalars with bounds, scale factors, and a
//! free/fixed flag, as owned by every [`Function`](crate::function::Function).

pub mod bounds;
pub mod parameter;

pub use bounds::Bounds;
pub use parameter::Parameter;
