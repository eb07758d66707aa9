pub mod connection;
pub mod device;
pub mod harvester;
pub mod inventory;
pub mod manifest;
pub mod packager;
pub mod reconciler;
pub mod storage;
pub mod uploader;
