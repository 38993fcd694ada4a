use std::fmt;

use crate::error::FaultKind;
use crate::state::{Address, Register};

/// A decoded CHIP-8 instruction.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    /// 00E0
    ClearScreen,
    /// 00EE
    SubroutineReturn,
    /// 1nnn
    Jump(Address),
    /// 2nnn
    SubroutineCall(Address),
    /// 3xkk
    SkipEqImmediate(Register, u8),
    /// 4xkk
    SkipNeqImmediate(Register, u8),
    /// 5xy0
    SkipEqRegister(Register, Register),
    /// 6xkk
    SetImmediate(Register, u8),
    /// 7xkk
    AddImmediate(Register, u8),
    /// 8xy0
    SetXToY(Register, Register),
    /// 8xy1
    Or(Register, Register),
    /// 8xy2
    And(Register, Register),
    /// 8xy3
    Xor(Register, Register),
    /// 8xy4
    AddWithCarry(Register, Register),
    /// 8xy5
    SubtractYFromX(Register, Register),
    /// 8xy6
    ShiftRight(Register, Register),
    /// 8xy7
    SubtractXFromY(Register, Register),
    /// 8xyE
    ShiftLeft(Register, Register),
    /// 9xy0
    SkipNeqRegister(Register, Register),
    /// Annn
    SetIndex(Address),
    /// Bnnn
    JumpWithOffset(Address),
    /// Cxkk
    Random(Register, u8),
    /// Dxyn
    Draw(Register, Register, u8),
    /// Ex9E
    SkipIfKeyPressed(Register),
    /// ExA1
    SkipIfKeyNotPressed(Register),
    /// Fx07
    ReadDelayTimer(Register),
    /// Fx0A
    WaitForKey(Register),
    /// Fx15
    SetDelayTimer(Register),
    /// Fx18
    SetSoundTimer(Register),
    /// Fx1E
    AddToIndex(Register),
    /// Fx29
    FontChar(Register),
    /// Fx33
    BinaryCodedDecimal(Register),
    /// Fx55
    Store(Register),
    /// Fx65
    Load(Register),
}

struct DecodedInstruction {
    /// First nibble. Selects the instruction family.
    opcode: u8,
    /// Second nibble. Used to look up one of the 16 registers.
    x: Register,
    /// Third nibble. Used to look up one of the 16 registers.
    y: Register,
    /// Fourth nibble. A 4-bit number.
    n: u8,
    /// The second byte (third and fourth nibbles). An 8-bit immediate number.
    kk: u8,
    /// The second, third, and fourth nibbles. A 12-bit immediate address.
    nnn: Address,
}
impl DecodedInstruction {
    fn new(raw: u16) -> Self {
        DecodedInstruction {
            opcode: (raw >> 12) as u8,
            x: Register::from_nibble((raw >> 8) as u8),
            y: Register::from_nibble((raw >> 4) as u8),
            n: (raw & 0x000F) as u8,
            kk: (raw & 0x00FF) as u8,
            nnn: raw & 0x0FFF,
        }
    }
}

/// Decodes a raw big-endian opcode.
pub fn decode(raw: u16) -> Result<Instruction, FaultKind> {
    use Instruction::*;

    let DecodedInstruction {
        opcode,
        x,
        y,
        n,
        kk,
        nnn,
    } = DecodedInstruction::new(raw);

    let instruction = match (opcode, n) {
        (0x0, _) => match nnn {
            0x0E0 => ClearScreen,
            0x0EE => SubroutineReturn,
            _ => return Err(FaultKind::UnimplementedOpcode(raw)),
        },
        (0x1, _) => Jump(nnn),
        (0x2, _) => SubroutineCall(nnn),
        (0x3, _) => SkipEqImmediate(x, kk),
        (0x4, _) => SkipNeqImmediate(x, kk),
        (0x5, 0x0) => SkipEqRegister(x, y),
        (0x6, _) => SetImmediate(x, kk),
        (0x7, _) => AddImmediate(x, kk),
        (0x8, 0x0) => SetXToY(x, y),
        (0x8, 0x1) => Or(x, y),
        (0x8, 0x2) => And(x, y),
        (0x8, 0x3) => Xor(x, y),
        (0x8, 0x4) => AddWithCarry(x, y),
        (0x8, 0x5) => SubtractYFromX(x, y),
        (0x8, 0x6) => ShiftRight(x, y),
        (0x8, 0x7) => SubtractXFromY(x, y),
        (0x8, 0xE) => ShiftLeft(x, y),
        (0x9, 0x0) => SkipNeqRegister(x, y),
        (0xA, _) => SetIndex(nnn),
        (0xB, _) => JumpWithOffset(nnn),
        (0xC, _) => Random(x, kk),
        (0xD, _) => Draw(x, y, n),
        (0xE, _) => match kk {
            0x9E => SkipIfKeyPressed(x),
            0xA1 => SkipIfKeyNotPressed(x),
            _ => return Err(FaultKind::UnimplementedOpcode(raw)),
        },
        (0xF, _) => match kk {
            0x07 => ReadDelayTimer(x),
            0x0A => WaitForKey(x),
            0x15 => SetDelayTimer(x),
            0x18 => SetSoundTimer(x),
            0x1E => AddToIndex(x),
            0x29 => FontChar(x),
            0x33 => BinaryCodedDecimal(x),
            0x55 => Store(x),
            0x65 => Load(x),
            _ => return Err(FaultKind::UnimplementedOpcode(raw)),
        },
        _ => return Err(FaultKind::UnimplementedOpcode(raw)),
    };
    Ok(instruction)
}

struct Reg(Register);
impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V{:X}", self.0.index())
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instruction::*;

        match *self {
            ClearScreen => write!(f, "CLS"),
            SubroutineReturn => write!(f, "RET"),
            Jump(addr) => write!(f, "JP {addr:#05X}"),
            SubroutineCall(addr) => write!(f, "CALL {addr:#05X}"),
            SkipEqImmediate(x, kk) => write!(f, "SE {}, {kk:#04X}", Reg(x)),
            SkipNeqImmediate(x, kk) => write!(f, "SNE {}, {kk:#04X}", Reg(x)),
            SkipEqRegister(x, y) => write!(f, "SE {}, {}", Reg(x), Reg(y)),
            SetImmediate(x, kk) => write!(f, "LD {}, {kk:#04X}", Reg(x)),
            AddImmediate(x, kk) => write!(f, "ADD {}, {kk:#04X}", Reg(x)),
            SetXToY(x, y) => write!(f, "LD {}, {}", Reg(x), Reg(y)),
            Or(x, y) => write!(f, "OR {}, {}", Reg(x), Reg(y)),
            And(x, y) => write!(f, "AND {}, {}", Reg(x), Reg(y)),
            Xor(x, y) => write!(f, "XOR {}, {}", Reg(x), Reg(y)),
            AddWithCarry(x, y) => write!(f, "ADD {}, {}", Reg(x), Reg(y)),
            SubtractYFromX(x, y) => write!(f, "SUB {}, {}", Reg(x), Reg(y)),
            ShiftRight(x, y) => write!(f, "SHR {}, {}", Reg(x), Reg(y)),
            SubtractXFromY(x, y) => write!(f, "SUBN {}, {}", Reg(x), Reg(y)),
            ShiftLeft(x, y) => write!(f, "SHL {}, {}", Reg(x), Reg(y)),
            SkipNeqRegister(x, y) => write!(f, "SNE {}, {}", Reg(x), Reg(y)),
            SetIndex(addr) => write!(f, "LD I, {addr:#05X}"),
            JumpWithOffset(addr) => write!(f, "JP V0, {addr:#05X}"),
            Random(x, kk) => write!(f, "RND {}, {kk:#04X}", Reg(x)),
            Draw(x, y, n) => write!(f, "DRW {}, {}, {n}", Reg(x), Reg(y)),
            SkipIfKeyPressed(x) => write!(f, "SKP {}", Reg(x)),
            SkipIfKeyNotPressed(x) => write!(f, "SKNP {}", Reg(x)),
            ReadDelayTimer(x) => write!(f, "LD {}, DT", Reg(x)),
            WaitForKey(x) => write!(f, "LD {}, K", Reg(x)),
            SetDelayTimer(x) => write!(f, "LD DT, {}", Reg(x)),
            SetSoundTimer(x) => write!(f, "LD ST, {}", Reg(x)),
            AddToIndex(x) => write!(f, "ADD I, {}", Reg(x)),
            FontChar(x) => write!(f, "LD F, {}", Reg(x)),
            BinaryCodedDecimal(x) => write!(f, "LD B, {}", Reg(x)),
            Store(x) => write!(f, "LD [I], {}", Reg(x)),
            Load(x) => write!(f, "LD {}, [I]", Reg(x)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Instruction::*;
    use Register::*;

    #[test]
    fn decodes_register_nibbles_shifted() {
        assert_eq!(decode(0x8AB4), Ok(AddWithCarry(VA, VB)));
        assert_eq!(decode(0x6F12), Ok(SetImmediate(VF, 0x12)));
        assert_eq!(decode(0xD125), Ok(Draw(V1, V2, 5)));
        assert_eq!(decode(0xE39E), Ok(SkipIfKeyPressed(V3)));
    }

    #[test]
    fn decodes_every_family() {
        let table = [
            (0x00E0, ClearScreen),
            (0x00EE, SubroutineReturn),
            (0x1ABC, Jump(0xABC)),
            (0x2300, SubroutineCall(0x300)),
            (0x3412, SkipEqImmediate(V4, 0x12)),
            (0x4512, SkipNeqImmediate(V5, 0x12)),
            (0x5670, SkipEqRegister(V6, V7)),
            (0x7801, AddImmediate(V8, 0x01)),
            (0x8120, SetXToY(V1, V2)),
            (0x8121, Or(V1, V2)),
            (0x8122, And(V1, V2)),
            (0x8123, Xor(V1, V2)),
            (0x8125, SubtractYFromX(V1, V2)),
            (0x8126, ShiftRight(V1, V2)),
            (0x8127, SubtractXFromY(V1, V2)),
            (0x812E, ShiftLeft(V1, V2)),
            (0x9120, SkipNeqRegister(V1, V2)),
            (0xA123, SetIndex(0x123)),
            (0xB200, JumpWithOffset(0x200)),
            (0xC0FF, Random(V0, 0xFF)),
            (0xE4A1, SkipIfKeyNotPressed(V4)),
            (0xF507, ReadDelayTimer(V5)),
            (0xF50A, WaitForKey(V5)),
            (0xF515, SetDelayTimer(V5)),
            (0xF518, SetSoundTimer(V5)),
            (0xF51E, AddToIndex(V5)),
            (0xF529, FontChar(V5)),
            (0xF533, BinaryCodedDecimal(V5)),
            (0xF555, Store(V5)),
            (0xF565, Load(V5)),
        ];
        for (raw, expected) in table {
            assert_eq!(decode(raw), Ok(expected), "opcode {raw:#06X}");
        }
    }

    #[test]
    fn unknown_opcodes_carry_the_raw_value() {
        for raw in [0x0123, 0x5121, 0x8128, 0x9121, 0xE100, 0xF0FF] {
            assert_eq!(decode(raw), Err(FaultKind::UnimplementedOpcode(raw)));
        }
    }

    #[test]
    fn mnemonics() {
        assert_eq!(decode(0x00E0).unwrap().to_string(), "CLS");
        assert_eq!(decode(0x1200).unwrap().to_string(), "JP 0x200");
        assert_eq!(decode(0x600A).unwrap().to_string(), "LD V0, 0x0A");
        assert_eq!(decode(0xD015).unwrap().to_string(), "DRW V0, V1, 5");
        assert_eq!(decode(0xFA55).unwrap().to_string(), "LD [I], VA");
    }
}
