use crate::error::{Error, Result};
use core::{fmt, num::NonZeroUsize};
use std::sync::Arc;

/// An opaque name for one unit of work.
///
/// The pool never looks inside an item; it only moves it from the queue to a
/// worker and back out in a [`WorkResult`](crate::WorkResult). Cloning is
/// cheap because the name is reference counted.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkItem(Arc<str>);

impl WorkItem {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for WorkItem {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for WorkItem {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for WorkItem {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

impl From<&String> for WorkItem {
    fn from(value: &String) -> Self {
        Self::new(value)
    }
}

/// Identity of a worker inside a pool, assigned from `1..=size` at start.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(pub usize);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// A validated, strictly positive number of workers.
///
/// A pool with zero workers would never drain its queue, so every path that
/// builds a pool goes through this type. Conversions from signed integers
/// exist so that negative values coming from configuration are reported as
/// [`Error::Configuration`] instead of wrapping around.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkerCount(NonZeroUsize);

impl WorkerCount {
    pub const fn new(count: NonZeroUsize) -> Self {
        Self(count)
    }

    pub const fn get(self) -> usize {
        self.0.get()
    }
}

impl fmt::Display for WorkerCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<usize> for WorkerCount {
    type Error = Error;

    fn try_from(value: usize) -> Result<Self> {
        NonZeroUsize::new(value)
            .map(Self)
            .ok_or_else(|| Error::Configuration {
                reason: "worker count must be greater than 0".to_string(),
            })
    }
}

impl TryFrom<i64> for WorkerCount {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self> {
        if value <= 0 {
            return Err(Error::Configuration {
                reason: format!("worker count must be greater than 0 (got {value})"),
            });
        }
        let value = usize::try_from(value).map_err(|_| Error::Configuration {
            reason: format!("worker count {value} does not fit in usize"),
        })?;
        Self::try_from(value)
    }
}
