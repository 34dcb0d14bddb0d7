pub mod activity;
pub mod event;
pub mod member;
pub mod payment;
pub mod session;
pub mod suggestion;
