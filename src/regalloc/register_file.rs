//! Physical register pool.
//!
//! The pool is three banks: the allocatable accumulators (r0, r1, r2 and
//! r4), register file A and register file B. Occupancy is tracked with one
//! bit per register, and allocation takes the lowest free register of the
//! first bank that has one, so accumulators are preferred over file A and
//! file A over file B.

use crate::qpu::{QpuReg, REGFILE_SIZE};

/// Register bank. Declaration order is allocation preference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegBank {
    Acc = 0,
    A = 1,
    B = 2,
}

pub const NUM_BANKS: usize = 3;

impl RegBank {
    pub const ALL: [RegBank; NUM_BANKS] = [RegBank::Acc, RegBank::A, RegBank::B];
}

/// Accumulators the allocator may hand out. r3 is scratch for staging moves
/// and colour packing, r5 holds the varying C coefficient.
pub const ALLOCATABLE_ACCUMULATORS: u64 = 0b1_0111;

/// Combined register identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolReg {
    pub bank: RegBank,
    pub id: u8,
}

impl PoolReg {
    pub const fn new(bank: RegBank, id: u8) -> Self {
        Self { bank, id }
    }

    pub fn to_qpu(self) -> QpuReg {
        match self.bank {
            RegBank::Acc => QpuReg::rn(self.id),
            RegBank::A => QpuReg::ra(self.id),
            RegBank::B => QpuReg::rb(self.id),
        }
    }

    pub fn r4() -> Self {
        Self::new(RegBank::Acc, 4)
    }
}

/// Bit set for tracking register sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegBitSet {
    banks: [u64; NUM_BANKS],
}

impl RegBitSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every register in `bank` that the allocator may use.
    pub fn all_in_bank(bank: RegBank) -> Self {
        let mut set = Self::new();
        set.banks[bank as usize] = match bank {
            RegBank::Acc => ALLOCATABLE_ACCUMULATORS,
            RegBank::A | RegBank::B => (1u64 << REGFILE_SIZE) - 1,
        };
        set
    }

    /// The whole allocatable pool.
    pub fn all() -> Self {
        let mut set = Self::new();
        for bank in RegBank::ALL {
            set.union(&Self::all_in_bank(bank));
        }
        set
    }

    pub fn single(reg: PoolReg) -> Self {
        let mut set = Self::new();
        set.set(reg);
        set
    }

    pub fn contains(&self, reg: PoolReg) -> bool {
        reg.id < 64 && self.banks[reg.bank as usize] & (1u64 << reg.id) != 0
    }

    pub fn set(&mut self, reg: PoolReg) {
        if reg.id < 64 {
            self.banks[reg.bank as usize] |= 1u64 << reg.id;
        }
    }

    pub fn clear(&mut self, reg: PoolReg) {
        if reg.id < 64 {
            self.banks[reg.bank as usize] &= !(1u64 << reg.id);
        }
    }

    pub fn union(&mut self, other: &RegBitSet) {
        for i in 0..NUM_BANKS {
            self.banks[i] |= other.banks[i];
        }
    }

    /// Remove every register in `other`.
    pub fn subtract(&mut self, other: &RegBitSet) {
        for i in 0..NUM_BANKS {
            self.banks[i] &= !other.banks[i];
        }
    }

    /// First set register in `bank` that is not in `exclude`.
    pub fn find_first_in_bank(&self, bank: RegBank, exclude: &RegBitSet) -> Option<PoolReg> {
        let available = self.banks[bank as usize] & !exclude.banks[bank as usize];
        if available == 0 {
            return None;
        }
        Some(PoolReg::new(bank, available.trailing_zeros() as u8))
    }

    pub fn count(&self) -> u32 {
        self.banks.iter().map(|b| b.count_ones()).sum()
    }
}

/// Occupancy of the pool and which temporary owns each register.
#[derive(Debug, Clone)]
pub struct RegisterFile {
    in_use: RegBitSet,
    owners: [[Option<u32>; 64]; NUM_BANKS],
}

impl RegisterFile {
    pub fn new() -> Self {
        Self {
            in_use: RegBitSet::new(),
            owners: [[None; 64]; NUM_BANKS],
        }
    }

    /// Take the first free register in `allowed` for `temp`.
    pub fn allocate(&mut self, allowed: &RegBitSet, temp: u32) -> Option<PoolReg> {
        let reg = RegBank::ALL
            .iter()
            .find_map(|bank| allowed.find_first_in_bank(*bank, &self.in_use))?;
        self.in_use.set(reg);
        self.owners[reg.bank as usize][reg.id as usize] = Some(temp);
        Some(reg)
    }

    pub fn free(&mut self, reg: PoolReg) {
        self.in_use.clear(reg);
        self.owners[reg.bank as usize][reg.id as usize] = None;
    }

    pub fn is_used(&self, reg: PoolReg) -> bool {
        self.in_use.contains(reg)
    }

    pub fn owner(&self, reg: PoolReg) -> Option<u32> {
        self.owners[reg.bank as usize][reg.id as usize]
    }

    pub fn live_count(&self) -> usize {
        self.in_use.count() as usize
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_size() {
        assert_eq!(RegBitSet::all().count(), 4 + 32 + 32);
        assert!(!RegBitSet::all().contains(PoolReg::new(RegBank::Acc, 3)));
        assert!(RegBitSet::all().contains(PoolReg::r4()));
    }

    #[test]
    fn test_allocation_order() {
        let mut file = RegisterFile::new();
        let mut allowed = RegBitSet::all();
        allowed.clear(PoolReg::r4());

        let regs: Vec<_> = (0..5).map(|t| file.allocate(&allowed, t).unwrap()).collect();
        assert_eq!(regs[0], PoolReg::new(RegBank::Acc, 0));
        assert_eq!(regs[2], PoolReg::new(RegBank::Acc, 2));
        assert_eq!(regs[3], PoolReg::new(RegBank::A, 0));
        assert_eq!(regs[4], PoolReg::new(RegBank::A, 1));
        assert_eq!(file.owner(regs[3]), Some(3));

        file.free(regs[1]);
        assert_eq!(file.allocate(&allowed, 9), Some(PoolReg::new(RegBank::Acc, 1)));
        assert_eq!(file.live_count(), 5);
    }

    #[test]
    fn test_exhaustion() {
        let mut file = RegisterFile::new();
        let allowed = RegBitSet::single(PoolReg::r4());
        assert!(file.allocate(&allowed, 0).is_some());
        assert!(file.allocate(&allowed, 1).is_none());
    }

    #[test]
    fn test_to_qpu() {
        assert_eq!(PoolReg::new(RegBank::B, 15).to_qpu(), QpuReg::rb(15));
        assert_eq!(PoolReg::r4().to_qpu(), QpuReg::r4());
    }
}
