pub mod args;
pub mod commands;
pub mod wizard;

pub use args::{Cli, Commands};
pub use commands::run;
pub use wizard::{Wizard, WizardInput, WizardSelection, WizardState};
