pub mod command;
pub mod editor;

pub use command::{apply_all, EditCommand};
pub use editor::{FieldLocator, FieldSetEditor};

use crate::view::{NotFound, ValidationError};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EditError {
    #[error(transparent)]
    NotFound(#[from] NotFound),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}
