pub mod device;
pub mod gamepad;
pub mod mapping;
pub mod socket;
