use crate::{Row, ShadowError};

/// The real database a session runs rewritten SQL against. Failures are
/// reported as [`ShadowError::Backend`] carrying the driver's message.
pub trait ShadowBackend {
    fn execute(&mut self, sql: &str) -> Result<Vec<Row>, ShadowError>;
}

impl<B: ShadowBackend + ?Sized> ShadowBackend for Box<B> {
    fn execute(&mut self, sql: &str) -> Result<Vec<Row>, ShadowError> {
        (**self).execute(sql)
    }
}
