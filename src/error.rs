// Error sum for the whole crate. Every error kind is fatal to the
// currently-running VM: it unwinds the dispatch loop and surfaces to
// whoever called `Vm::execute`. Nothing is caught or recovered internally.

use enumflags2::BitFlags;

use crate::value::TypeTag;

pub type TypeSet = BitFlags<TypeTag>;

#[derive(Clone, Debug, PartialEq)]
pub enum VmError {
    /// `pop`/`peek`/`swap` below arity.
    StackUnderflow,
    /// Opcode byte unassigned, or reserved-but-unimplemented
    /// (`ARRAY_GET`/`ARRAY_SET`).
    InvalidOpcode(u8),
    /// `DIV` or `MOD` with a zero divisor.
    DivisionByZero,
    /// Reserved for future array indexing (no opcode raises this yet).
    IndexOutOfBounds,
    /// Type mismatch in arithmetic, coercion, or `ARRAY_LEN`.
    InvalidCast { expect: TypeSet, got: TypeTag },
    /// `JMP`/`JMP_IF_*`/`CALL` target past the end of the code.
    InvalidJump { target: usize, len: usize },
    /// Host allocator failure. Not raised by this implementation (Rust's
    /// allocator aborts the process on OOM rather than handing back an
    /// error), but the variant is kept so the error enum still matches
    /// the wire contract's error list.
    OutOfMemory,
    /// A decode read ran past the end of the code buffer. Not one of the
    /// semantic error kinds; a framing error from the byte decoder.
    UnexpectedEof,
}

impl std::fmt::Display for VmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VmError::StackUnderflow => write!(f, "stack underflow"),
            VmError::InvalidOpcode(b) => write!(f, "invalid opcode: 0x{:02x}", b),
            VmError::DivisionByZero => write!(f, "division by zero"),
            VmError::IndexOutOfBounds => write!(f, "index out of bounds"),
            VmError::InvalidCast { expect, got } => {
                write!(f, "invalid cast: expected one of {:?}, got {:?}", expect, got)
            }
            VmError::InvalidJump { target, len } => {
                write!(f, "invalid jump target {} (code length {})", target, len)
            }
            VmError::OutOfMemory => write!(f, "out of memory"),
            VmError::UnexpectedEof => write!(f, "unexpected end of bytecode"),
        }
    }
}

impl std::error::Error for VmError {}

pub type Result<T> = std::result::Result<T, VmError>;

pub(crate) fn expected(expect: TypeSet, got: &crate::value::Value) -> VmError {
    VmError::InvalidCast { expect, got: got.type_tag() }
}
