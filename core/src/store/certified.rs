//! Certified vs. uncertified value reconciliation.

/// A value with a three-state certification flag.
///
/// Uncertified reads are cheaper and faster but can reflect stale or
/// unverified replica state; once a value has been certified it is ground
/// truth until explicitly invalidated by a mutating call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Certified<T> {
    /// No fetch has completed yet.
    NotLoaded,
    /// Loaded optimistically, not cryptographically verified.
    Uncertified(T),
    /// Loaded with a verification proof.
    Certified(T),
}

impl<T> Certified<T> {
    pub fn loaded(data: T, certified: bool) -> Self {
        if certified {
            Certified::Certified(data)
        } else {
            Certified::Uncertified(data)
        }
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Certified::NotLoaded => None,
            Certified::Uncertified(data) | Certified::Certified(data) => Some(data),
        }
    }

    pub fn into_data(self) -> Option<T> {
        match self {
            Certified::NotLoaded => None,
            Certified::Uncertified(data) | Certified::Certified(data) => Some(data),
        }
    }

    pub fn is_loaded(&self) -> bool {
        !matches!(self, Certified::NotLoaded)
    }

    pub fn is_certified(&self) -> bool {
        matches!(self, Certified::Certified(_))
    }

    /// Merge an incoming value into this one.
    ///
    /// Rules, in order:
    /// 1. an incoming certified value always overwrites;
    /// 2. an incoming uncertified value never replaces a certified one
    ///    (silently rejected — an expected race, not a fault);
    /// 3. otherwise the incoming value overwrites.
    ///
    /// Returns whether the incoming value was applied.
    pub fn merge(&mut self, incoming: Certified<T>) -> bool {
        match incoming {
            Certified::NotLoaded => false,
            Certified::Certified(_) => {
                *self = incoming;
                true
            }
            Certified::Uncertified(_) => {
                if self.is_certified() {
                    return false;
                }
                *self = incoming;
                true
            }
        }
    }
}

impl<T> Default for Certified<T> {
    fn default() -> Self {
        Certified::NotLoaded
    }
}
