/// Errors specific to Windows walks.
#[derive(thiserror::Error, Debug)]
pub enum WindowsError {
    /// A kernel structure holds a value that cannot be walked.
    #[error("Corrupted struct: {0}")]
    CorruptedStruct(&'static str),
}

impl From<WindowsError> for kwalk_core::WalkError {
    fn from(value: WindowsError) -> Self {
        kwalk_core::WalkError::Os(value.into())
    }
}
