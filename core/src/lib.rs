//! Core of `snipesync`: pulls device inventories from MDM platforms (Jamf
//! Pro, Kandji, Intune) and reconciles them into Snipe-IT.

pub mod category;
pub mod clean;
pub mod config;
pub mod connection;
pub mod device;
mod error;
pub mod http;
pub mod manufacturer;
pub mod reconcile;
pub mod resolver;
pub mod snipe;
pub mod sources;
pub mod summary;
pub mod verify;

pub use error::Result;
pub use error::SyncErr;
