pub mod base;
pub mod notification;
pub mod restaurant;

pub use base::BaseDao;
