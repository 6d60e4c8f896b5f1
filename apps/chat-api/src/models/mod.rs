pub mod message;
pub mod room;
pub mod room_member;
pub mod user;
