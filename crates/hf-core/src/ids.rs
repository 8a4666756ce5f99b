use core::fmt;
use core::num::NonZeroU32;

/// Handle of a child system inside one diagram, equal to its add order.
///
/// Stored off by one so `Option<SystemId>` is no larger than `SystemId`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SystemId(NonZeroU32);

impl SystemId {
    /// Handle for the child at `slot`, or `None` past the last representable one.
    pub fn from_slot(slot: usize) -> Option<Self> {
        u32::try_from(slot)
            .ok()
            .and_then(|s| s.checked_add(1))
            .and_then(NonZeroU32::new)
            .map(Self)
    }

    /// Position of the child in its diagram's child list.
    pub fn slot(self) -> usize {
        (self.0.get() - 1) as usize
    }
}

impl fmt::Debug for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SystemId({})", self.slot())
    }
}

impl fmt::Display for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.slot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_round_trip() {
        for slot in [0_usize, 1, 2, 42, 10_000] {
            assert_eq!(SystemId::from_slot(slot).map(SystemId::slot), Some(slot));
        }
    }

    #[test]
    fn optional_handle_is_niche_packed() {
        assert_eq!(
            core::mem::size_of::<SystemId>(),
            core::mem::size_of::<Option<SystemId>>()
        );
    }

    #[test]
    fn slots_past_u32_have_no_handle() {
        assert!(SystemId::from_slot(u32::MAX as usize).is_none());
        assert_eq!(format!("{}", SystemId::from_slot(3).unwrap()), "#3");
    }
}
