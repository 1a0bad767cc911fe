mod migrations;
mod store;

pub use store::MessageStore;
