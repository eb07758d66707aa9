pub mod ftp;
pub mod storage;
