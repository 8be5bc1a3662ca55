pub mod health;
pub use self::health::health;

pub mod token;
pub use self::token::create_token;
