pub mod actions;
pub mod replay;
pub mod validate;
