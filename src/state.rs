use crate::display::FONT_SET;
use crate::error::FaultKind;

pub type Timer = u8;
pub type Address = u16;

pub const MEM_SIZE: usize = 4096;
pub const FONT_ADDR: Address = 0x50;
pub const FONT_HEIGHT: usize = 5;
pub const PC_START_ADDR: Address = 0x200;
pub const MAX_ROM_SIZE: usize = MEM_SIZE - PC_START_ADDR as usize;
pub const NUM_REGISTERS: usize = 16;
pub const STACK_DEPTH: usize = 16;

pub struct Memory {
    data: [u8; MEM_SIZE],
}
impl Memory {
    /// Creates zeroed memory with the hex font loaded into the reserved area.
    pub fn new() -> Self {
        let data = {
            let mut data = [0; MEM_SIZE];
            let font_start = usize::from(FONT_ADDR);
            data[font_start..font_start + FONT_SET.len()].copy_from_slice(&FONT_SET);
            data
        };

        Memory { data }
    }

    pub fn read(&self, addr: Address) -> Result<u8, FaultKind> {
        self.data
            .get(usize::from(addr))
            .copied()
            .ok_or(FaultKind::OutOfBounds {
                address: usize::from(addr),
            })
    }

    pub fn write(&mut self, addr: Address, value: u8) -> Result<(), FaultKind> {
        let cell = self
            .data
            .get_mut(usize::from(addr))
            .ok_or(FaultKind::OutOfBounds {
                address: usize::from(addr),
            })?;
        *cell = value;
        Ok(())
    }

    /// Reads the big-endian opcode stored at `addr` and `addr + 1`.
    pub fn read_opcode(&self, addr: Address) -> Result<u16, FaultKind> {
        let bytes = self.read_slice(addr, 2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Borrows `len` bytes starting at `addr`, faulting if any of them lies
    /// past the end of memory.
    pub fn read_slice(&self, addr: Address, len: usize) -> Result<&[u8], FaultKind> {
        let start = usize::from(addr);
        let end = start + len;
        if end > MEM_SIZE {
            return Err(FaultKind::OutOfBounds {
                address: end.max(start + 1) - 1,
            });
        }
        Ok(&self.data[start..end])
    }

    pub fn write_slice(&mut self, addr: Address, bytes: &[u8]) -> Result<(), FaultKind> {
        let start = usize::from(addr);
        let end = start + bytes.len();
        if end > MEM_SIZE {
            return Err(FaultKind::OutOfBounds {
                address: end.max(start + 1) - 1,
            });
        }
        self.data[start..end].copy_from_slice(bytes);
        Ok(())
    }

    pub fn load_rom(&mut self, rom: &[u8]) -> Result<(), FaultKind> {
        if rom.len() > MAX_ROM_SIZE {
            return Err(FaultKind::RomTooLarge {
                size: rom.len(),
                max_size: MAX_ROM_SIZE,
            });
        }
        self.write_slice(PC_START_ADDR, rom)
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Register {
    V0,
    V1,
    V2,
    V3,
    V4,
    V5,
    V6,
    V7,
    V8,
    V9,
    VA,
    VB,
    VC,
    VD,
    VE,
    VF,
}
impl Register {
    const ALL: [Register; NUM_REGISTERS] = [
        Register::V0,
        Register::V1,
        Register::V2,
        Register::V3,
        Register::V4,
        Register::V5,
        Register::V6,
        Register::V7,
        Register::V8,
        Register::V9,
        Register::VA,
        Register::VB,
        Register::VC,
        Register::VD,
        Register::VE,
        Register::VF,
    ];

    /// Maps an opcode nibble to its register. Only the low four bits count.
    pub fn from_nibble(nibble: u8) -> Self {
        Self::ALL[usize::from(nibble & 0x0F)]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// V0 up to and including `self`.
    pub fn through(self) -> impl Iterator<Item = Register> {
        Self::ALL.into_iter().take(self.index() + 1)
    }
}

#[derive(Clone, Debug, Default)]
pub struct RegisterBank {
    registers: [u8; NUM_REGISTERS],
}
impl RegisterBank {
    pub fn new() -> Self {
        RegisterBank {
            registers: [0; NUM_REGISTERS],
        }
    }

    pub fn read(&self, reg: Register) -> u8 {
        self.registers[reg.index()]
    }

    pub fn write(&mut self, reg: Register, value: u8) {
        self.registers[reg.index()] = value;
    }

    pub fn set_flag(&mut self, flag: bool) {
        self.write(Register::VF, u8::from(flag));
    }
}

/// Return addresses of the active subroutine calls.
#[derive(Clone, Debug, Default)]
pub struct CallStack {
    frames: [Address; STACK_DEPTH],
    sp: usize,
}
impl CallStack {
    pub fn new() -> Self {
        CallStack {
            frames: [0; STACK_DEPTH],
            sp: 0,
        }
    }

    pub fn push(&mut self, addr: Address) -> Result<(), FaultKind> {
        if self.sp == STACK_DEPTH {
            return Err(FaultKind::StackOverflow { depth: STACK_DEPTH });
        }
        self.frames[self.sp] = addr;
        self.sp += 1;
        Ok(())
    }

    pub fn pop(&mut self) -> Result<Address, FaultKind> {
        if self.sp == 0 {
            return Err(FaultKind::StackUnderflow);
        }
        self.sp -= 1;
        Ok(self.frames[self.sp])
    }

    pub fn depth(&self) -> usize {
        self.sp
    }
}

/// The delay and sound timers. Both count down once per [`Timers::tick`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Timers {
    pub delay: Timer,
    pub sound: Timer,
}
impl Timers {
    pub fn new() -> Self {
        Timers { delay: 0, sound: 0 }
    }

    pub fn tick(&mut self) {
        self.delay = self.delay.saturating_sub(1);
        self.sound = self.sound.saturating_sub(1);
    }

    pub fn sound_active(&self) -> bool {
        self.sound > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn font_is_loaded_at_font_addr() {
        let memory = Memory::new();
        assert_eq!(
            memory.read_slice(FONT_ADDR, FONT_HEIGHT).unwrap(),
            &[0xF0, 0x90, 0x90, 0x90, 0xF0]
        );
        assert_eq!(memory.read(PC_START_ADDR).unwrap(), 0);
    }

    #[test]
    fn out_of_range_access_faults() {
        let mut memory = Memory::new();
        assert_eq!(
            memory.read(0x1000),
            Err(FaultKind::OutOfBounds { address: 0x1000 })
        );
        assert_eq!(
            memory.write(0xFFFF, 1),
            Err(FaultKind::OutOfBounds { address: 0xFFFF })
        );
        assert_eq!(
            memory.read_opcode(0x0FFF),
            Err(FaultKind::OutOfBounds { address: 0x1000 })
        );
        assert!(memory.read_slice(0x0FFE, 2).is_ok());
    }

    #[test]
    fn load_rom_places_bytes_at_start_address() {
        let mut memory = Memory::new();
        memory.load_rom(&[0x12, 0x34, 0x56]).unwrap();
        assert_eq!(memory.read_opcode(PC_START_ADDR).unwrap(), 0x1234);
        assert_eq!(memory.read(PC_START_ADDR + 2).unwrap(), 0x56);
    }

    #[test]
    fn load_rom_rejects_oversized_images() {
        let mut memory = Memory::new();
        assert!(memory.load_rom(&vec![0xAA; MAX_ROM_SIZE]).is_ok());
        assert_eq!(
            memory.load_rom(&vec![0xAA; MAX_ROM_SIZE + 1]),
            Err(FaultKind::RomTooLarge {
                size: MAX_ROM_SIZE + 1,
                max_size: MAX_ROM_SIZE,
            })
        );
    }

    #[test]
    fn register_from_nibble_masks_high_bits() {
        assert_eq!(Register::from_nibble(0x0), Register::V0);
        assert_eq!(Register::from_nibble(0xF), Register::VF);
        assert_eq!(Register::from_nibble(0x1A), Register::VA);
        assert_eq!(Register::V3.through().count(), 4);
    }

    #[test]
    fn call_stack_holds_sixteen_frames() {
        let mut stack = CallStack::new();
        for addr in 0..STACK_DEPTH as Address {
            stack.push(addr).unwrap();
        }
        assert_eq!(
            stack.push(0x300),
            Err(FaultKind::StackOverflow { depth: STACK_DEPTH })
        );
        for addr in (0..STACK_DEPTH as Address).rev() {
            assert_eq!(stack.pop(), Ok(addr));
        }
        assert_eq!(stack.pop(), Err(FaultKind::StackUnderflow));
    }

    #[test]
    fn timers_stop_at_zero() {
        let mut timers = Timers { delay: 2, sound: 1 };
        timers.tick();
        assert_eq!(timers, Timers { delay: 1, sound: 0 });
        assert!(!timers.sound_active());
        timers.tick();
        timers.tick();
        assert_eq!(timers, Timers::new());
    }
}
