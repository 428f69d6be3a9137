pub mod goal;
pub mod strategy;
pub mod trade;
pub mod user;

pub use goal::*;
pub use strategy::*;
pub use trade::*;
pub use user::*;
