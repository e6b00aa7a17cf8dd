pub mod magnet;
pub mod session;

pub use magnet::{CleaningRecord, Magnet, MagnetMapping};
pub use session::{TransferSession, TransferStatus};
