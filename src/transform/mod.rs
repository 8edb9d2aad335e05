pub mod catalog;
pub mod event;
