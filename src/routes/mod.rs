pub mod bid;
pub mod rating;
pub mod request;
pub mod review;
#[cfg(test)]
mod tests;
