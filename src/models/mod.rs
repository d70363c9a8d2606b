pub mod actor;
pub mod delivery;
pub mod fraud;
pub mod message;
pub mod notification;
pub mod review;
pub mod trip;
pub mod wallet;
