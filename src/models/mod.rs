pub mod actor;
pub mod request;
pub mod bid;
pub mod review;
pub mod rating;

pub use actor::*;
pub use request::*;
pub use bid::*;
pub use review::*;
pub use rating::*;
