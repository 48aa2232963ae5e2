// Wire opcode table. The numeric assignments are a stable wire contract,
// shared with whatever compiler produced the bytecode; do not renumber.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Print = 1,
    LoadConst = 2,
    LoadInt = 3,
    LoopStart = 4,
    LoopEnd = 5,
    LoadVar = 6,
    Stdin = 7,
    Store = 8,
    Add = 9,
    Sub = 10,
    Mul = 11,
    Div = 12,
    Mod = 13,
    Eq = 14,
    Ne = 15,
    Lt = 16,
    Le = 17,
    Gt = 18,
    Ge = 19,
    And = 20,
    Or = 21,
    Not = 22,
    Jmp = 23,
    JmpIfFalse = 24,
    JmpIfTrue = 25,
    Call = 26,
    Ret = 27,
    LoadFloat = 28,
    CastInt = 29,
    CastFloat = 30,
    ArrayNew = 31,
    ArrayGet = 32,
    ArraySet = 33,
    ArrayLen = 34,
    Dup = 35,
    Swap = 36,
    Pop = 37,
    LoadNull = 38,
    IsNull = 39,
    LoadBool = 40,
    BuildList = 41,
    BuildTuple = 42,
    BuildDict = 43,
}

impl Opcode {
    pub fn from_byte(b: u8) -> Option<Opcode> {
        use Opcode::*;
        Some(match b {
            1 => Print,
            2 => LoadConst,
            3 => LoadInt,
            4 => LoopStart,
            5 => LoopEnd,
            6 => LoadVar,
            7 => Stdin,
            8 => Store,
            9 => Add,
            10 => Sub,
            11 => Mul,
            12 => Div,
            13 => Mod,
            14 => Eq,
            15 => Ne,
            16 => Lt,
            17 => Le,
            18 => Gt,
            19 => Ge,
            20 => And,
            21 => Or,
            22 => Not,
            23 => Jmp,
            24 => JmpIfFalse,
            25 => JmpIfTrue,
            26 => Call,
            27 => Ret,
            28 => LoadFloat,
            29 => CastInt,
            30 => CastFloat,
            31 => ArrayNew,
            32 => ArrayGet,
            33 => ArraySet,
            34 => ArrayLen,
            35 => Dup,
            36 => Swap,
            37 => Pop,
            38 => LoadNull,
            39 => IsNull,
            40 => LoadBool,
            41 => BuildList,
            42 => BuildTuple,
            43 => BuildDict,
            _ => return None,
        })
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}
