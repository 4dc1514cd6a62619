pub use chess;

pub mod error;
pub mod game_data;
pub mod pgn;
pub mod san;
