//! Game implementations refereed by the server.

pub mod tictactoe;
