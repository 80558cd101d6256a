pub mod alert;
pub mod entity;
pub mod role;

pub use alert::*;
pub use entity::*;
pub use role::*;
