mod pin;
mod run;

pub use pin::{fingerprint, pin, unpin};
pub use run::run;
