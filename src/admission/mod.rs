//! Admission subsystem: the gate a configuration passes before it can go live.
//!
//! # Data Flow
//! ```text
//! App (raw, as decoded)
//!     → defaults.rs (fill unset strategy / match)
//!     → validation.rs (first failing check wins)
//!     → App (admitted, safe to compile)
//! ```

pub mod defaults;
pub mod validation;

pub use defaults::{apply_defaults, default_strategy};
pub use validation::{validate, AdmissionError, HTTP_METHODS};

use crate::config::schema::App;

/// Default then validate an application.
pub fn admit(mut app: App) -> Result<App, AdmissionError> {
    apply_defaults(&mut app);
    validate(&app)?;
    Ok(app)
}
