pub mod picker;
pub mod theme;

#[cfg(test)]
pub mod test_helpers;

pub use picker::{Picker, PickerOutcome, run_picker};
