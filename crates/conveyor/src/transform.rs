//! Capability traits for per-item work.
//!
//! A [`Transform`] turns one job into one output, or into a
//! [`TransformError`] that is carried inside that job's outcome. A
//! [`Validator`] checks a job before it is transformed; [`Validated`]
//! composes the two.
//!
//! Both traits are implemented for plain closures, so most callers never
//! name them:
//!
//! ```
//! use conveyor::{Transform, TransformError, Validated};
//!
//! let double = |x: u64| Ok::<_, TransformError>(x * 2);
//! let small = |x: &u64| {
//!     if *x <= 10 { Ok(()) } else { Err(TransformError::rejected(format!("{x} exceeds 10"))) }
//! };
//!
//! let checked = Validated::new(small, double);
//! assert_eq!(checked.apply(4_u64), Ok(8));
//! assert!(checked.apply(11_u64).is_err());
//! ```

use crate::TransformError;

/// A per-item function applied by each worker.
///
/// Implementations run on Tokio's blocking pool and must not spawn
/// unmanaged concurrency of their own.
pub trait Transform<I>: Send + Sync + 'static {
    type Output: Send + 'static;

    fn apply(&self, job: I) -> Result<Self::Output, TransformError>;
}

impl<I, O, F> Transform<I> for F
where
    F: Fn(I) -> Result<O, TransformError> + Send + Sync + 'static,
    O: Send + 'static,
{
    type Output = O;

    fn apply(&self, job: I) -> Result<O, TransformError> {
        self(job)
    }
}

/// A precondition checked before a job is transformed.
pub trait Validator<I>: Send + Sync + 'static {
    fn validate(&self, job: &I) -> Result<(), TransformError>;
}

impl<I, F> Validator<I> for F
where
    F: Fn(&I) -> Result<(), TransformError> + Send + Sync + 'static,
{
    fn validate(&self, job: &I) -> Result<(), TransformError> {
        self(job)
    }
}

/// A transform guarded by a validator.
///
/// Jobs the validator refuses never reach the transform; their outcome
/// carries the validator's error instead.
#[derive(Clone, Debug)]
pub struct Validated<V, T> {
    validator: V,
    transform: T,
}

impl<V, T> Validated<V, T> {
    pub const fn new(validator: V, transform: T) -> Self {
        Self {
            validator,
            transform,
        }
    }
}

impl<I, V, T> Transform<I> for Validated<V, T>
where
    V: Validator<I>,
    T: Transform<I>,
{
    type Output = T::Output;

    fn apply(&self, job: I) -> Result<T::Output, TransformError> {
        self.validator.validate(&job)?;
        self.transform.apply(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NonEmpty;

    impl Validator<String> for NonEmpty {
        fn validate(&self, job: &String) -> Result<(), TransformError> {
            if job.is_empty() {
                Err(TransformError::rejected("empty string"))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn closures_are_transforms() {
        let square = |x: i64| Ok::<_, TransformError>(x * x);
        assert_eq!(square.apply(-3), Ok(9));
    }

    #[test]
    fn failing_transform_reports_failure() {
        let parse = |s: String| {
            s.parse::<u32>()
                .map_err(|e| TransformError::failed(e.to_string()))
        };
        assert_eq!(parse.apply("42".to_owned()), Ok(42));
        assert!(matches!(
            parse.apply("forty-two".to_owned()),
            Err(TransformError::Failed { .. })
        ));
    }

    #[test]
    fn validator_short_circuits_transform() {
        let upper = |s: String| Ok::<_, TransformError>(s.to_uppercase());
        let checked = Validated::new(NonEmpty, upper);

        assert_eq!(checked.apply("go".to_owned()), Ok("GO".to_owned()));
        assert_eq!(
            checked.apply(String::new()),
            Err(TransformError::rejected("empty string"))
        );
    }
}
