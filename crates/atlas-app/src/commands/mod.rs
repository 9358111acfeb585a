pub mod dev;
pub mod dialog;
pub mod terminal;
