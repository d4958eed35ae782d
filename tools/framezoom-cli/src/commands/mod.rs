pub mod check;
pub mod info;
pub mod render;
pub mod serve;
pub mod validate;
