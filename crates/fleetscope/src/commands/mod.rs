pub mod init;
pub mod levels;
pub mod render;
pub mod settings;
