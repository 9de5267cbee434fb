pub mod health;
pub mod open;
pub mod restricted;
