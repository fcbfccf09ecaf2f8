use crate::error::{Error, Result};
use core::cmp::Ordering;
use core::fmt;

/// Largest counter value an authority will ever persist or grant.
///
/// The counter is stored in a `u64` but the usable space is capped at 62
/// bits. At one million allocations per second a single sequence takes over
/// 146,000 years to exhaust an era, so promotions are effectively a
/// recovery-path concern. [`AuthorityConfig::counter_limit`] can lower the
/// cap to exercise promotion in tests.
///
/// [`AuthorityConfig::counter_limit`]: crate::AuthorityConfig::counter_limit
pub const MAX_COUNTER: u64 = (1 << 62) - 1;

/// Longest permitted scope or sequence name, in bytes.
pub const MAX_NAME_LEN: usize = 255;

/// A Global Distributed ID.
///
/// A `Gdid` is unique within its `(scope, sequence, authority)` triple. The
/// `era` is a coarse epoch bumped only when the fine-grained `counter` would
/// overflow; the `authority` field is the shard that issued the ID and makes
/// output from distinct shards collision-free by construction.
///
/// Ordering is defined only between IDs issued by the same authority shard,
/// by `(era, counter)` ascending. Comparing IDs from different shards yields
/// `None`; equality and hashing always consider all three fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Gdid {
    pub era: u32,
    pub authority: u16,
    pub counter: u64,
}

impl Gdid {
    pub const fn new(era: u32, authority: u16, counter: u64) -> Self {
        Self {
            era,
            authority,
            counter,
        }
    }
}

impl PartialOrd for Gdid {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.authority != other.authority {
            return None;
        }
        Some((self.era, self.counter).cmp(&(other.era, other.counter)))
    }
}

impl fmt::Display for Gdid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.era, self.authority, self.counter)
    }
}

/// Logical namespace for one monotonic counter: `(scope, sequence)`.
///
/// Both components are validated on construction so malformed names are
/// rejected synchronously, before any lock is taken or network call issued.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SequenceKey {
    scope: String,
    sequence: String,
}

impl SequenceKey {
    /// Builds a validated key.
    ///
    /// Components must be non-empty, at most [`MAX_NAME_LEN`] bytes,
    /// limited to ASCII alphanumerics plus `_`, `-` and `.`, and must not
    /// start with a dot or dash.
    pub fn new(scope: impl Into<String>, sequence: impl Into<String>) -> Result<Self> {
        let scope = scope.into();
        let sequence = sequence.into();
        validate_name("scope", &scope)?;
        validate_name("sequence", &sequence)?;
        Ok(Self { scope, sequence })
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn sequence(&self) -> &str {
        &self.sequence
    }
}

impl fmt::Display for SequenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.scope, self.sequence)
    }
}

fn validate_name(what: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidKey {
            reason: format!("{what} must not be empty"),
        });
    }
    if name.len() > MAX_NAME_LEN {
        return Err(Error::InvalidKey {
            reason: format!("{what} exceeds {MAX_NAME_LEN} bytes"),
        });
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
    {
        return Err(Error::InvalidKey {
            reason: format!("{what} contains invalid character {c:?}"),
        });
    }
    // No leading dot or dash: keeps names unambiguous as file names and
    // rules out `.`/`..` path components.
    if name.starts_with('.') || name.starts_with('-') {
        return Err(Error::InvalidKey {
            reason: format!("{what} must start with an alphanumeric or underscore"),
        });
    }
    Ok(())
}

/// Durable `(era, counter)` record for one [`SequenceKey`].
///
/// `counter` is the next unissued value: every counter strictly below it has
/// either been granted or permanently skipped. The record is created lazily
/// at zero and grows monotonically for the lifetime of the deployment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SequenceState {
    pub era: u32,
    pub counter: u64,
}

impl SequenceState {
    pub const fn new(era: u32, counter: u64) -> Self {
        Self { era, counter }
    }
}

/// Exclusive lease on the half-open counter range `[start, start + count)`
/// within `(era, authority)`, returned by a successful allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockGrant {
    pub era: u32,
    pub authority: u16,
    pub start: u64,
    pub count: u64,
}

impl BlockGrant {
    /// One past the last counter covered by this grant.
    pub const fn end(&self) -> u64 {
        self.start + self.count
    }

    /// Whether the two grants cover any common counter in the same
    /// `(era, authority)` space.
    pub fn overlaps(&self, other: &BlockGrant) -> bool {
        self.authority == other.authority
            && self.era == other.era
            && self.start < other.end()
            && other.start < self.end()
    }
}

impl fmt::Display for BlockGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "era {} authority {} [{}, {})",
            self.era,
            self.authority,
            self.start,
            self.end()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_order_within_one_authority() {
        let a = Gdid::new(0, 3, 10);
        let b = Gdid::new(0, 3, 11);
        let c = Gdid::new(1, 3, 0);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn ids_from_different_shards_are_unordered() {
        let a = Gdid::new(0, 1, 10);
        let b = Gdid::new(0, 2, 10);
        assert_eq!(a.partial_cmp(&b), None);
        assert_ne!(a, b);
    }

    #[test]
    fn key_validation_rejects_bad_names() {
        assert!(SequenceKey::new("", "sky_log").is_err());
        assert!(SequenceKey::new("sky", "").is_err());
        assert!(SequenceKey::new("sky", "sky log").is_err());
        assert!(SequenceKey::new("sky/../etc", "x").is_err());
        assert!(SequenceKey::new("sky", "..").is_err());
        assert!(SequenceKey::new("sky", "-flag").is_err());
        assert!(SequenceKey::new("a".repeat(256), "x").is_err());
        assert!(SequenceKey::new("sky", "sky_log.v2-archive").is_ok());
    }

    #[test]
    fn grant_overlap_respects_era_and_shard() {
        let g = BlockGrant {
            era: 0,
            authority: 1,
            start: 0,
            count: 100,
        };
        let same_era = BlockGrant { start: 99, ..g };
        let adjacent = BlockGrant { start: 100, ..g };
        let next_era = BlockGrant { era: 1, ..g };
        assert!(g.overlaps(&same_era));
        assert!(!g.overlaps(&adjacent));
        assert!(!g.overlaps(&next_era));
    }
}
