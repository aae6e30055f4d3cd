pub mod pin_store;

pub use pin_store::FilePinStore;
