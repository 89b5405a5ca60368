//! Data models shared by the session core and the dashboard API.

mod ids;
mod user;

pub use ids::UserId;
pub use user::{LoginResponse, User};
