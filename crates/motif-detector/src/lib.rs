pub use chess;

pub mod board_utils;
pub mod classify;
pub mod error;
pub mod finding;
pub mod greek_gift;
pub mod mate_patterns;
pub mod oracle;
pub mod sacrifice;
pub mod tactics;

#[cfg(test)]
mod test_support;
