pub mod dispatch;
pub mod fcm;
