mod check;
mod classify;
mod validate;
mod wait;

pub use check::run_check;
pub use classify::run_classify;
pub use validate::run_validate;
pub use wait::run_wait;
