pub mod fanout;
pub mod log;
pub mod webhook;
