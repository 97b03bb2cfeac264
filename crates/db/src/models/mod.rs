pub mod notification;
pub mod restaurant;

pub use notification::*;
pub use restaurant::*;
