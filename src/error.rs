use thiserror::Error;

/// Error returned when a lookup or a cursor dereference has nothing to refer to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum OutOfRange {
    /// A past-the-end cursor was dereferenced.
    #[error("cannot dereference a past-the-end cursor")]
    PastTheEnd,
    /// A key required to be present was not found.
    #[error("key is not present in the container")]
    MissingKey,
}

/// Result type for container lookups.
pub type Result<T> = std::result::Result<T, OutOfRange>;
