pub mod controller_service;
pub mod manual;
pub mod sequence;
pub mod synchronizer;
