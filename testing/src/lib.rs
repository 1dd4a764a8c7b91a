//! # Dormclean Testing
//!
//! Testing utilities for the dormclean workspace.
//!
//! This crate provides:
//! - [`FixedClock`]: deterministic, manually advanced time
//! - [`InMemoryStore`]: every store trait over one mutex-guarded set of tables
//! - [`RecordingMailer`]: captures outbound e-mail and can simulate relay failures
//! - [`fixtures`]: profile, building and booking builders
//! - [`Harness`]: the three wired together the way services expect them
//!
//! ## Example
//!
//! ```
//! use dormclean_testing::Harness;
//! use dormclean_testing::fixtures::provider;
//! use dormclean_core::providers::ProfileStore;
//!
//! # async fn example() -> dormclean_core::Result<()> {
//! let harness = Harness::new();
//! harness.store.save_profile(&provider("p-qfs", "QFS", 20.0)).await?;
//! assert!(harness.mailer.sent().is_empty());
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, TimeDelta, Utc};
use dormclean_core::environment::Clock;
use std::sync::{Arc, RwLock};

pub mod fixtures;
mod mailer;
mod store;

pub use mailer::RecordingMailer;
pub use store::InMemoryStore;

/// Mock implementations of environment traits.
pub mod mocks {
    use super::{Arc, Clock, DateTime, RwLock, TimeDelta, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Returns the same time until advanced. Clones share the same time.
    ///
    /// # Example
    ///
    /// ```
    /// use dormclean_testing::mocks::FixedClock;
    /// use dormclean_core::environment::Clock;
    /// use chrono::{TimeDelta, Utc};
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// assert_eq!(time1, clock.now());
    /// clock.advance(TimeDelta::minutes(1));
    /// assert_eq!(clock.now() - time1, TimeDelta::minutes(1));
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: Arc<RwLock<DateTime<Utc>>>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(RwLock::new(time)),
            }
        }

        /// Move the clock forward.
        pub fn advance(&self, by: TimeDelta) {
            if let Ok(mut time) = self.time.write() {
                *time += by;
            }
        }

        /// Jump to an absolute time.
        pub fn set(&self, to: DateTime<Utc>) {
            if let Ok(mut time) = self.time.write() {
                *time = to;
            }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time.read().map_or_else(|poisoned| *poisoned.into_inner(), |time| *time)
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(DateTime::<Utc>::UNIX_EPOCH + TimeDelta::seconds(1_735_689_600))
    }
}

pub use mocks::{FixedClock, test_clock};

/// In-memory store, recording mailer and fixed clock, shared by reference.
#[derive(Debug, Clone)]
pub struct Harness {
    /// Every store trait
    pub store: Arc<InMemoryStore>,
    /// Captured e-mail
    pub mailer: Arc<RecordingMailer>,
    /// Test time, starting at [`test_clock`]
    pub clock: Arc<FixedClock>,
}

impl Harness {
    /// Fresh, empty harness.
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: Arc::new(InMemoryStore::new()),
            mailer: Arc::new(RecordingMailer::new()),
            clock: Arc::new(test_clock()),
        }
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

/// Install a test-writer tracing subscriber, once per process.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
