// A running detection session and the command surface over it.

pub mod commands;
pub mod state;
