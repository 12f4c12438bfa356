//! Component E (transcription client) and component F (turn coordinator).

pub mod client;
pub mod turn;
