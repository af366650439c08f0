use crate::encode::{Emit, EmitKind};
use serde::Serialize;

/// Smallest multiple of `n` that is not below `addr`.
///
/// Returns `None` for `n == 0` or when the result does not fit in 32 bits.
pub fn align_address(addr: u32, n: u32) -> Option<u32> {
    if n == 0 {
        return None;
    }
    if n.is_power_of_two() {
        let mask = n - 1;
        addr.checked_add(mask).map(|v| v & !mask)
    } else {
        match addr % n {
            0 => Some(addr),
            rem => addr.checked_add(n - rem),
        }
    }
}

/// Address of the next emitted byte, plus the origin set by the last `ORG`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LocationCounter {
    current: u32,
    base: u32,
}

impl LocationCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// `$`
    pub fn current(&self) -> u32 {
        self.current
    }

    /// `$$`
    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn org(&mut self, addr: u32) {
        self.current = addr;
        self.base = addr;
    }

    pub fn advance(&mut self, n: u32) {
        self.current = self.current.wrapping_add(n);
    }

    /// Record one byte at the current address and step past it.
    pub fn emit(&mut self, byte: u8, kind: EmitKind) -> Emit {
        let emit = Emit {
            address: self.current,
            byte,
            kind,
        };
        self.advance(1);
        emit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brute_force(addr: u32, n: u32) -> u32 {
        (addr..).find(|a| a % n == 0).unwrap()
    }

    #[test]
    fn align_power_of_two() {
        for n in [1, 2, 4, 8, 16, 512] {
            for addr in 0..1100 {
                assert_eq!(align_address(addr, n), Some(brute_force(addr, n)));
            }
        }
    }

    #[test]
    fn align_other() {
        for n in [3, 5, 6, 7, 10, 100] {
            for addr in 0..1100 {
                assert_eq!(align_address(addr, n), Some(brute_force(addr, n)));
            }
        }
    }

    #[test]
    fn align_zero_and_overflow() {
        assert_eq!(align_address(10, 0), None);
        assert_eq!(align_address(u32::MAX, 16), None);
        assert_eq!(align_address(u32::MAX, 7), None);
    }

    #[test]
    fn org_sets_both_counters() {
        let mut lc = LocationCounter::new();
        lc.advance(3);
        lc.org(0x7C00);
        assert_eq!(lc.current(), 0x7C00);
        assert_eq!(lc.base(), 0x7C00);
        let e = lc.emit(0x90, EmitKind::Opcode);
        assert_eq!(e.address, 0x7C00);
        assert_eq!(lc.current(), 0x7C01);
        assert_eq!(lc.base(), 0x7C00);
    }
}
