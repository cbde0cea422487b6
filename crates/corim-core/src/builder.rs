//! Error-carrying builder state
//!
//! Setters validate their argument immediately. The first failure is
//! recorded and every later setter becomes a no-op, so a chain can be
//! written without checking each step; the terminal `build()` returns the
//! recorded error instead of a half-built value.

use crate::errors::{CorimError, Result, ResultExt};

/// Value under construction plus the first error seen while building it
#[derive(Debug, Clone)]
pub struct Staged<T> {
    value: T,
    error: Option<CorimError>,
}

impl<T> Staged<T> {
    /// Start from an initial value
    pub fn new(value: T) -> Self {
        Self { value, error: None }
    }

    /// Run a setter unless an earlier one already failed
    ///
    /// A failure is wrapped with `context` and recorded.
    pub fn apply<F>(&mut self, context: &str, f: F)
    where
        F: FnOnce(&mut T) -> Result<()>,
    {
        if self.error.is_some() {
            return;
        }
        if let Err(err) = f(&mut self.value).context(context.to_string()) {
            self.error = Some(err);
        }
    }

    /// Record a failure directly
    pub fn fail(&mut self, err: CorimError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    /// The recorded error, if any
    pub fn error(&self) -> Option<&CorimError> {
        self.error.as_ref()
    }

    /// True while no setter has failed
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Borrow the value under construction
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Return the value, or the first recorded error
    pub fn finish(self) -> Result<T> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.value),
        }
    }
}

impl<T: Default> Default for Staged<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn test_first_error_wins() {
        let mut staged = Staged::new(Vec::<u32>::new());
        staged.apply("first", |v| {
            v.push(1);
            Ok(())
        });
        staged.apply("second", |_| Err(CorimError::invalid("n", "too big")));
        staged.apply("third", |_| Err(CorimError::missing("x")));
        staged.apply("fourth", |v| {
            v.push(4);
            Ok(())
        });

        assert!(!staged.is_ok());
        assert_eq!(staged.value(), &vec![1]);
        let err = staged.finish().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
        assert!(err.to_string().starts_with("second: "));
    }

    #[test]
    fn test_finish_ok() {
        let mut staged = Staged::<u32>::default();
        staged.apply("set", |v| {
            *v = 9;
            Ok(())
        });
        assert_eq!(staged.finish().unwrap(), 9);
    }
}
