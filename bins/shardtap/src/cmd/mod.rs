pub mod consume;
pub mod decode;
