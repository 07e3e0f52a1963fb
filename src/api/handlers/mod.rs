pub mod health;
pub use self::health::health;

pub mod relay;
pub use self::relay::{relay, send_contact_form, send_membership_form};
