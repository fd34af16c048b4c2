pub mod assignment;
pub mod event;
pub mod order;
pub mod packing;
pub mod personnel;
