use enum_map::{Enum, EnumMap, enum_map};
use once_cell::sync::Lazy;

pub const BX_BIAS: i64 = 131071; // 2^17 - 1
pub const FIELDS_PER_FLUSH: usize = 50;

#[derive(Debug, Enum, Copy, Clone, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum OpMode {
    iABC,
    iABx,
    iAsBx,
    iAx,
}

#[derive(Debug, Enum, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    Move = 0,
    LoadK,
    LoadKx,
    LoadBool,
    LoadNil,
    GetUpval,
    GetTabUp,
    GetTable,
    SetTabUp,
    SetUpval,
    SetTable,
    NewTable,
    LSelf,
    Add,
    Sub,
    Mul,
    Mod,
    Pow,
    Div,
    IDiv,
    BAnd,
    BOr,
    BXor,
    Shl,
    Shr,
    Unm,
    BNot,
    Not,
    Len,
    Concat,
    Jmp,
    Eq,
    Lt,
    Le,
    Test,
    TestSet,
    Call,
    TailCall,
    Return,
    ForLoop,
    ForPrep,
    TForCall,
    TForLoop,
    SetList,
    Closure,
    Vararg,
    ExtraArg,
}

impl TryFrom<u8> for OpCode {
    type Error = crate::error::LuaError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use OpCode::*;
        Ok(match value {
            0 => Move,
            1 => LoadK,
            2 => LoadKx,
            3 => LoadBool,
            4 => LoadNil,
            5 => GetUpval,
            6 => GetTabUp,
            7 => GetTable,
            8 => SetTabUp,
            9 => SetUpval,
            10 => SetTable,
            11 => NewTable,
            12 => LSelf,
            13 => Add,
            14 => Sub,
            15 => Mul,
            16 => Mod,
            17 => Pow,
            18 => Div,
            19 => IDiv,
            20 => BAnd,
            21 => BOr,
            22 => BXor,
            23 => Shl,
            24 => Shr,
            25 => Unm,
            26 => BNot,
            27 => Not,
            28 => Len,
            29 => Concat,
            30 => Jmp,
            31 => Eq,
            32 => Lt,
            33 => Le,
            34 => Test,
            35 => TestSet,
            36 => Call,
            37 => TailCall,
            38 => Return,
            39 => ForLoop,
            40 => ForPrep,
            41 => TForCall,
            42 => TForLoop,
            43 => SetList,
            44 => Closure,
            45 => Vararg,
            46 => ExtraArg,
            _ => return Err(crate::error::LuaError::CorruptChunk("unknown opcode")),
        })
    }
}

static OP_MODES: Lazy<EnumMap<OpCode, OpMode>> = Lazy::new(|| {
    use OpCode::*;
    use OpMode::*;
    enum_map! {
        Move => iABC,
        LoadK => iABx,
        LoadKx => iABx,
        LoadBool => iABC,
        LoadNil => iABC,
        GetUpval => iABC,
        GetTabUp => iABC,
        GetTable => iABC,
        SetTabUp => iABC,
        SetUpval => iABC,
        SetTable => iABC,
        NewTable => iABC,
        LSelf => iABC,
        Add => iABC,
        Sub => iABC,
        Mul => iABC,
        Mod => iABC,
        Pow => iABC,
        Div => iABC,
        IDiv => iABC,
        BAnd => iABC,
        BOr => iABC,
        BXor => iABC,
        Shl => iABC,
        Shr => iABC,
        Unm => iABC,
        BNot => iABC,
        Not => iABC,
        Len => iABC,
        Concat => iABC,
        Jmp => iAsBx,
        Eq => iABC,
        Lt => iABC,
        Le => iABC,
        Test => iABC,
        TestSet => iABC,
        Call => iABC,
        TailCall => iABC,
        Return => iABC,
        ForLoop => iAsBx,
        ForPrep => iAsBx,
        TForCall => iABC,
        TForLoop => iAsBx,
        SetList => iABC,
        Closure => iABx,
        Vararg => iABC,
        ExtraArg => iAx,
    }
});

#[derive(Debug, Clone, Copy)]
pub struct Instruction {
    pub mode: OpMode,
    pub op: OpCode,
    pub a: usize,
    pub b: usize,
    pub c: usize,
    pub bx: usize,
    pub sbx: i64,
    pub ax: usize,
}

impl TryFrom<u32> for Instruction {
    type Error = crate::error::LuaError;

    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        let op = OpCode::try_from((raw & 0x3F) as u8)?;
        let mode = OP_MODES[op];
        let a = ((raw >> 6) & 0xFF) as usize;

        let mut ins = Instruction { mode, op, a, b: 0, c: 0, bx: 0, sbx: 0, ax: 0 };
        match mode {
            OpMode::iABC => {
                ins.c = ((raw >> 14) & 0x1FF) as usize;
                ins.b = ((raw >> 23) & 0x1FF) as usize;
            }
            OpMode::iABx => {
                ins.bx = (raw >> 14) as usize;
            }
            OpMode::iAsBx => {
                ins.sbx = (raw >> 14) as i64 - BX_BIAS;
            }
            OpMode::iAx => {
                ins.ax = (raw >> 6) as usize;
            }
        }
        Ok(ins)
    }
}

// bit 0x100 set means constant index rk & 0xFF, otherwise register index rk
pub const RK_CONST_FLAG: usize = 0x100;

pub fn is_constant(rk: usize) -> bool {
    rk & RK_CONST_FLAG != 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_abc(op: u8, a: u32, b: u32, c: u32) -> u32 {
        (op as u32) | (a << 6) | (c << 14) | (b << 23)
    }

    #[test]
    fn decodes_iabc_round_trip() {
        let raw = encode_abc(OpCode::Move as u8, 12, 34, 56);
        let ins = Instruction::try_from(raw).unwrap();
        assert_eq!(ins.a, 12);
        assert_eq!(ins.b, 34);
        assert_eq!(ins.c, 56);
    }

    #[test]
    fn decodes_iasbx_with_bias() {
        let bx = (BX_BIAS + 5) as u32;
        let raw = (OpCode::Jmp as u32) | (0u32 << 6) | (bx << 14);
        let ins = Instruction::try_from(raw).unwrap();
        assert_eq!(ins.sbx, 5);
    }

    #[test]
    fn decodes_iax() {
        let raw = (OpCode::ExtraArg as u32) | (12345u32 << 6);
        let ins = Instruction::try_from(raw).unwrap();
        assert_eq!(ins.ax, 12345);
    }

    #[test]
    fn rk_flag_detects_constants() {
        assert!(is_constant(0x100 | 3));
        assert!(!is_constant(3));
    }
}
