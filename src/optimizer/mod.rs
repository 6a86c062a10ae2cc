pub mod dp;

pub use dp::{optimize, DpInput};
