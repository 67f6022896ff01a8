pub mod response;

pub use response::{parse_id, ApiError, ApiResponse};
