use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::Quirks;
use crate::display::{DISPLAY_HEIGHT, DISPLAY_WIDTH, Framebuffer};
use crate::error::{Fault, FaultKind};
use crate::instruction::{Instruction, decode};
use crate::keypad::{Key, Keypad};
use crate::state::{
    Address, CallStack, FONT_ADDR, FONT_HEIGHT, Memory, PC_START_ADDR, Register, RegisterBank,
    Timers,
};

/// Outcome of a successful [`Chip8::step`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StepResult {
    /// The instruction completed and PC moved on.
    Ready,
    /// The VM is waiting for a key press (Fx0A). PC did not move; step again
    /// once input has been delivered.
    Blocked,
}

/// Where PC goes after an instruction.
enum Flow {
    Next,
    Skip,
    Jump(Address),
    Block,
}

impl Flow {
    fn skip_if(condition: bool) -> Self {
        if condition { Flow::Skip } else { Flow::Next }
    }
}

/// The whole machine: CPU registers plus the memory, screen, keypad and
/// timers it drives.
pub struct Chip8 {
    pub memory: Memory,
    pub registers: RegisterBank,
    pub pc: Address,
    pub index: Address,
    pub stack: CallStack,
    pub timers: Timers,
    pub display: Framebuffer,
    pub keypad: Keypad,
    quirks: Quirks,
    rng: StdRng,
    fault: Option<Fault>,
}

impl Chip8 {
    pub fn new(quirks: Quirks) -> Self {
        Self::with_rng(quirks, StdRng::from_os_rng())
    }

    /// Creates a machine whose random number instruction replays the same
    /// sequence on every run.
    pub fn with_seed(quirks: Quirks, seed: u64) -> Self {
        Self::with_rng(quirks, StdRng::seed_from_u64(seed))
    }

    fn with_rng(quirks: Quirks, rng: StdRng) -> Self {
        Chip8 {
            memory: Memory::new(),
            registers: RegisterBank::new(),
            pc: PC_START_ADDR,
            index: 0,
            stack: CallStack::new(),
            timers: Timers::new(),
            display: Framebuffer::new(),
            keypad: Keypad::new(),
            quirks,
            rng,
            fault: None,
        }
    }

    /// Returns the machine to its power-on state. Quirks and the random
    /// source are kept.
    pub fn reset(&mut self) {
        log::debug!("resetting machine");
        self.memory = Memory::new();
        self.registers = RegisterBank::new();
        self.pc = PC_START_ADDR;
        self.index = 0;
        self.stack = CallStack::new();
        self.timers = Timers::new();
        self.display = Framebuffer::new();
        self.keypad = Keypad::new();
        self.fault = None;
    }

    pub fn load_rom(&mut self, rom: &[u8]) -> Result<(), Fault> {
        self.memory
            .load_rom(rom)
            .map_err(|kind| Fault::new(PC_START_ADDR, None, kind))?;
        log::debug!("loaded {} byte ROM at {:#05X}", rom.len(), PC_START_ADDR);
        Ok(())
    }

    /// Counts both timers down by one. Call at 60Hz, independently of
    /// [`Chip8::step`].
    pub fn tick(&mut self) {
        self.timers.tick();
    }

    pub fn quirks(&self) -> Quirks {
        self.quirks
    }

    /// The fault that halted the machine, if any.
    pub fn fault(&self) -> Option<Fault> {
        self.fault
    }

    pub fn is_halted(&self) -> bool {
        self.fault.is_some()
    }

    pub fn is_waiting_for_key(&self) -> bool {
        self.keypad.is_awaiting()
    }

    /// Fetches, decodes and executes the instruction at PC.
    ///
    /// A fault halts the machine; it is returned now and again on every
    /// following call.
    pub fn step(&mut self) -> Result<StepResult, Fault> {
        if let Some(fault) = self.fault {
            return Err(fault);
        }

        let pc = self.pc;
        let opcode = Self::check_aligned(pc)
            .and_then(|()| self.memory.read_opcode(pc))
            .map_err(|kind| self.halt(Fault::new(pc, None, kind)))?;

        let flow = decode(opcode).and_then(|instruction| {
            log::trace!("{pc:#05X}: {opcode:04X}  {instruction}");
            self.execute(instruction)
        });

        match flow {
            Ok(Flow::Next) => self.pc = pc.wrapping_add(2),
            Ok(Flow::Skip) => self.pc = pc.wrapping_add(4),
            Ok(Flow::Jump(target)) => self.pc = target,
            Ok(Flow::Block) => return Ok(StepResult::Blocked),
            Err(kind) => return Err(self.halt(Fault::new(pc, Some(opcode), kind))),
        }
        Ok(StepResult::Ready)
    }

    /// Instructions are two bytes wide and always start on an even address.
    fn check_aligned(pc: Address) -> Result<(), FaultKind> {
        if pc & 1 != 0 {
            return Err(FaultKind::OutOfBounds {
                address: usize::from(pc),
            });
        }
        Ok(())
    }

    fn halt(&mut self, fault: Fault) -> Fault {
        log::warn!("halting: {fault}");
        self.fault = Some(fault);
        fault
    }

    fn read(&self, reg: Register) -> u8 {
        self.registers.read(reg)
    }

    fn write(&mut self, reg: Register, value: u8) {
        self.registers.write(reg, value);
    }

    fn execute(&mut self, instruction: Instruction) -> Result<Flow, FaultKind> {
        use Instruction::*;

        let flow = match instruction {
            ClearScreen => {
                self.display.clear();
                Flow::Next
            }
            SubroutineReturn => Flow::Jump(self.stack.pop()?),
            Jump(addr) => Flow::Jump(addr),
            SubroutineCall(addr) => {
                self.stack.push(self.pc.wrapping_add(2))?;
                Flow::Jump(addr)
            }
            SkipEqImmediate(x, kk) => Flow::skip_if(self.read(x) == kk),
            SkipNeqImmediate(x, kk) => Flow::skip_if(self.read(x) != kk),
            SkipEqRegister(x, y) => Flow::skip_if(self.read(x) == self.read(y)),
            SkipNeqRegister(x, y) => Flow::skip_if(self.read(x) != self.read(y)),
            SetImmediate(x, kk) => {
                self.write(x, kk);
                Flow::Next
            }
            AddImmediate(x, kk) => {
                self.write(x, self.read(x).wrapping_add(kk));
                Flow::Next
            }
            SetXToY(x, y) => {
                self.write(x, self.read(y));
                Flow::Next
            }
            Or(x, y) => self.logic(x, y, |a, b| a | b),
            And(x, y) => self.logic(x, y, |a, b| a & b),
            Xor(x, y) => self.logic(x, y, |a, b| a ^ b),
            AddWithCarry(x, y) => {
                let (sum, carry) = self.read(x).overflowing_add(self.read(y));
                self.write(x, sum);
                self.registers.set_flag(carry);
                Flow::Next
            }
            SubtractYFromX(x, y) => {
                let (value_x, value_y) = (self.read(x), self.read(y));
                self.write(x, value_x.wrapping_sub(value_y));
                self.registers.set_flag(value_x > value_y);
                Flow::Next
            }
            SubtractXFromY(x, y) => {
                let (value_x, value_y) = (self.read(x), self.read(y));
                self.write(x, value_y.wrapping_sub(value_x));
                self.registers.set_flag(value_y > value_x);
                Flow::Next
            }
            ShiftRight(x, y) => {
                let value = self.shift_source(x, y);
                self.write(x, value >> 1);
                self.registers.set_flag(value & 0x01 != 0);
                Flow::Next
            }
            ShiftLeft(x, y) => {
                let value = self.shift_source(x, y);
                self.write(x, value << 1);
                self.registers.set_flag(value & 0x80 != 0);
                Flow::Next
            }
            SetIndex(addr) => {
                self.index = addr;
                Flow::Next
            }
            JumpWithOffset(addr) => Flow::Jump(addr + Address::from(self.read(Register::V0))),
            Random(x, kk) => {
                let value = self.rng.random::<u8>() & kk;
                self.write(x, value);
                Flow::Next
            }
            Draw(x, y, n) => {
                let pos_x = usize::from(self.read(x)) % DISPLAY_WIDTH;
                let pos_y = usize::from(self.read(y)) % DISPLAY_HEIGHT;
                let sprite = self.memory.read_slice(self.index, usize::from(n))?;
                let collision = self.display.draw(sprite, pos_x, pos_y);
                self.registers.set_flag(collision);
                Flow::Next
            }
            SkipIfKeyPressed(x) => {
                let key = Key::from_index(self.read(x))?;
                Flow::skip_if(self.keypad.is_pressed(key))
            }
            SkipIfKeyNotPressed(x) => {
                let key = Key::from_index(self.read(x))?;
                Flow::skip_if(!self.keypad.is_pressed(key))
            }
            ReadDelayTimer(x) => {
                self.write(x, self.timers.delay);
                Flow::Next
            }
            WaitForKey(x) => match self.keypad.await_key() {
                Some(key) => {
                    self.write(x, key.index());
                    Flow::Next
                }
                None => Flow::Block,
            },
            SetDelayTimer(x) => {
                self.timers.delay = self.read(x);
                Flow::Next
            }
            SetSoundTimer(x) => {
                self.timers.sound = self.read(x);
                Flow::Next
            }
            AddToIndex(x) => {
                self.index = self.index.wrapping_add(Address::from(self.read(x)));
                Flow::Next
            }
            FontChar(x) => {
                let digit = Address::from(self.read(x) & 0x0F);
                self.index = FONT_ADDR + digit * FONT_HEIGHT as Address;
                Flow::Next
            }
            BinaryCodedDecimal(x) => {
                let value = self.read(x);
                let bcd = [value / 100, (value / 10) % 10, value % 10];
                self.memory.write_slice(self.index, &bcd)?;
                Flow::Next
            }
            Store(x) => {
                let mut values = [0u8; 16];
                for reg in x.through() {
                    values[reg.index()] = self.read(reg);
                }
                self.memory.write_slice(self.index, &values[..=x.index()])?;
                self.bump_index(x);
                Flow::Next
            }
            Load(x) => {
                let values = self.memory.read_slice(self.index, x.index() + 1)?;
                for (reg, &value) in x.through().zip(values) {
                    self.registers.write(reg, value);
                }
                self.bump_index(x);
                Flow::Next
            }
        };
        Ok(flow)
    }

    fn logic(&mut self, x: Register, y: Register, op: impl Fn(u8, u8) -> u8) -> Flow {
        self.write(x, op(self.read(x), self.read(y)));
        if self.quirks.logic_resets_vf {
            self.registers.set_flag(false);
        }
        Flow::Next
    }

    fn shift_source(&self, x: Register, y: Register) -> u8 {
        if self.quirks.shift_uses_vy {
            self.read(y)
        } else {
            self.read(x)
        }
    }

    fn bump_index(&mut self, x: Register) {
        if self.quirks.load_store_bumps_index {
            self.index = self.index.wrapping_add(x.index() as Address + 1);
        }
    }
}

impl Default for Chip8 {
    fn default() -> Self {
        Self::new(Quirks::default())
    }
}
