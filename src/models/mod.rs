pub mod recommendation;
pub mod thesis;
pub mod user;

pub use recommendation::*;
pub use thesis::*;
pub use user::*;
