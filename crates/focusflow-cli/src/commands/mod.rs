pub mod config;
pub mod energy;
pub mod focus;
pub mod game;
pub mod history;
pub mod run;
mod session;
