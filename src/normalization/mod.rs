pub mod category;
pub mod contact;
pub mod numeric;
pub mod slug;
