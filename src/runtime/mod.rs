pub mod class;
pub mod class_resolution;
pub mod context;
pub mod enums;
pub mod inheritance;
pub mod object;
pub mod resource_manager;
pub mod traits;
pub mod visibility;
