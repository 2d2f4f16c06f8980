pub mod config;
pub mod logging;

pub mod batch;
pub mod dispatch;
pub mod storage;
pub mod transfer;
pub mod url_model;
