pub mod init;
pub mod root;
