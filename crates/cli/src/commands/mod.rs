pub mod context;
pub mod doctor;
pub mod serve;
pub mod status;
