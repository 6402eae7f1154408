use thiserror::Error;

use crate::Handle;

/// Errors returned by [`BoundedPool`](crate::BoundedPool).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// Every unit of capacity is checked out.
    #[error("pool exhausted: all {capacity} units are checked out")]
    Exhausted { capacity: usize },

    /// The handle belongs to another pool or its unit is not checked out.
    #[error("invalid release of {handle}")]
    InvalidRelease { handle: Handle },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_display() {
        let err = PoolError::Exhausted { capacity: 5 };
        assert_eq!(err.to_string(), "pool exhausted: all 5 units are checked out");
    }

    #[test]
    fn test_invalid_release_display() {
        let err = PoolError::InvalidRelease {
            handle: Handle::new(3, 2, 0),
        };
        assert_eq!(err.to_string(), "invalid release of handle 2 of pool 3");
    }

    #[test]
    fn test_equality() {
        assert_eq!(
            PoolError::Exhausted { capacity: 1 },
            PoolError::Exhausted { capacity: 1 }
        );
        assert_ne!(
            PoolError::Exhausted { capacity: 1 },
            PoolError::Exhausted { capacity: 2 }
        );
    }
}
