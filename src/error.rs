use std::fmt;
use thiserror::Error;

/// The ring buffer had no free slot for a value.
///
/// Returned by [`Producer::enqueue`](crate::Producer::enqueue) when the
/// consumer has not yet advanced past the slot the producer would write
/// next. This is a routine transient state rather than a fault: the value is
/// handed back unchanged so the caller can retry, back off, or give up.
#[derive(Clone, Copy, PartialEq, Eq, Error)]
#[error("ring buffer is full")]
pub struct Full<T>(pub T);

impl<T> Full<T> {
    /// Returns the value that could not be enqueued.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for Full<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Full(..)")
    }
}

/// One side of the ring buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// The side that advances `write_index`.
    Producer,
    /// The side that advances `read_index`.
    Consumer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Producer => f.write_str("producer"),
            Role::Consumer => f.write_str("consumer"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_hands_back_the_value() {
        let err = Full(String::from("payload"));
        assert_eq!(err.to_string(), "ring buffer is full");
        assert_eq!(format!("{err:?}"), "Full(..)");
        assert_eq!(err.into_inner(), "payload");
    }

    #[test]
    fn role_display() {
        assert_eq!(Role::Producer.to_string(), "producer");
        assert_eq!(Role::Consumer.to_string(), "consumer");
    }
}
