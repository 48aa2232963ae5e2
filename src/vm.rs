// uDashBoard: featherweight dashboard application.
//
// Copyright (C) 2019  Brandon Lewis
//
// This program is free software: you can redistribute it and/or
// modify it under the terms of the GNU Lesser General Public License
// as published by the Free Software Foundation, either version 3 of
// the License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
// Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public
// License along with this program.  If not, see
// <https://www.gnu.org/licenses/>.

// Stack machine. `Vm` owns the operand stack, the call frame stack, and
// the global variable table; `execute` is the dispatch loop over a code
// slice, and recurses on the body of each LOOP_START (see `exec_loop`
// below).

use std::collections::HashMap;
use std::io::{BufRead, Write};

use crate::decode::Decoder;
use crate::error::{Result, VmError};
use crate::opcode::Opcode;
use crate::value::Value;

struct Frame {
    return_ip: usize,
    // Stack depth at CALL time. Informational only (RET does not rewind
    // the operand stack to it).
    base: usize,
    locals: HashMap<Vec<u8>, Value>,
}

pub struct Vm {
    stack: Vec<Value>,
    call_stack: Vec<Frame>,
    globals: HashMap<Vec<u8>, Value>,
    // Set on every LOOP_START iteration. No opcode reads it back; kept
    // only because the wire format reserves the concept.
    current_loop_index: i64,
}

enum Flow {
    Continue,
    Return,
}

impl Vm {
    pub fn new() -> Vm {
        Vm {
            stack: Vec::with_capacity(64),
            call_stack: Vec::new(),
            globals: HashMap::new(),
            current_loop_index: 0,
        }
    }

    pub fn run<W: Write, R: BufRead>(
        &mut self,
        code: &[u8],
        out: &mut W,
        input: &mut R,
    ) -> Result<()> {
        self.execute(code, out, input)
    }

    fn execute<W: Write, R: BufRead>(
        &mut self,
        code: &[u8],
        out: &mut W,
        input: &mut R,
    ) -> Result<()> {
        let dec = Decoder::new(code);
        let mut ip = 0usize;
        while ip < dec.len() {
            let op_byte = dec.read_u8(&mut ip)?;
            let opcode = Opcode::from_byte(op_byte).ok_or(VmError::InvalidOpcode(op_byte))?;
            crate::trace!("ip={} op={:?} stack_depth={}", ip - 1, opcode, self.stack.len());
            match self.dispatch(opcode, &dec, &mut ip, out, input)? {
                Flow::Continue => {}
                Flow::Return => return Ok(()),
            }
        }
        Ok(())
    }

    fn dispatch<W: Write, R: BufRead>(
        &mut self,
        opcode: Opcode,
        dec: &Decoder,
        ip: &mut usize,
        out: &mut W,
        input: &mut R,
    ) -> Result<Flow> {
        use Opcode::*;
        match opcode {
            Print => {
                let v = self.pop()?;
                let mut bytes = v.render_bytes();
                bytes.push(b'\n');
                out.write_all(&bytes).map_err(|_| VmError::OutOfMemory)?;
                Ok(Flow::Continue)
            }
            Stdin => {
                let line = read_stdin_line(input)?;
                self.push(Value::Str(line));
                Ok(Flow::Continue)
            }
            LoadConst => {
                let s = dec.read_string(ip)?;
                self.push(Value::Str(s));
                Ok(Flow::Continue)
            }
            LoadInt => {
                let v = dec.read_i64(ip)?;
                self.push(Value::Integer(v));
                Ok(Flow::Continue)
            }
            LoadFloat => {
                let v = dec.read_f64(ip)?;
                self.push(Value::Float(v));
                Ok(Flow::Continue)
            }
            LoadBool => {
                let v = dec.read_u64(ip)?;
                self.push(Value::Boolean(v != 0));
                Ok(Flow::Continue)
            }
            LoadNull => {
                self.push(Value::Null);
                Ok(Flow::Continue)
            }
            LoadVar => {
                let name = dec.read_string(ip)?;
                let v = self.lookup(&name);
                self.push(v);
                Ok(Flow::Continue)
            }
            Store => {
                let name = dec.read_string(ip)?;
                let v = self.pop()?;
                self.bind(name, v);
                Ok(Flow::Continue)
            }
            Dup => {
                let v = self.peek()?.deep_clone();
                self.push(v);
                Ok(Flow::Continue)
            }
            Swap => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(b);
                self.push(a);
                Ok(Flow::Continue)
            }
            Pop => {
                self.pop()?;
                Ok(Flow::Continue)
            }
            Add => self.binary(|a, b| a.add(b)),
            Sub => self.binary(|a, b| a.sub(b)),
            Mul => self.binary(|a, b| a.mul(b)),
            Div => self.binary(|a, b| a.div(b)),
            Mod => self.binary(|a, b| a.modulo(b)),
            Eq => self.binary_bool(|a, b| a.eq_value(b)),
            Ne => self.binary_bool(|a, b| !a.eq_value(b)),
            Lt => self.binary_bool(|a, b| a.lt_value(b)),
            Le => self.binary_bool(|a, b| a.le_value(b)),
            Gt => self.binary_bool(|a, b| a.gt_value(b)),
            Ge => self.binary_bool(|a, b| a.ge_value(b)),
            And => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(Value::Boolean(a.truthy() && b.truthy()));
                Ok(Flow::Continue)
            }
            Or => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(Value::Boolean(a.truthy() || b.truthy()));
                Ok(Flow::Continue)
            }
            Not => {
                let v = self.pop()?;
                self.push(Value::Boolean(!v.truthy()));
                Ok(Flow::Continue)
            }
            Jmp => {
                let target = dec.read_u64(ip)?;
                *ip = check_jump(target, dec.len())?;
                Ok(Flow::Continue)
            }
            JmpIfFalse => {
                let target = dec.read_u64(ip)?;
                let cond = self.pop()?;
                if !cond.truthy() {
                    *ip = check_jump(target, dec.len())?;
                }
                Ok(Flow::Continue)
            }
            JmpIfTrue => {
                let target = dec.read_u64(ip)?;
                let cond = self.pop()?;
                if cond.truthy() {
                    *ip = check_jump(target, dec.len())?;
                }
                Ok(Flow::Continue)
            }
            Call => {
                let target = dec.read_u64(ip)?;
                let target = check_jump(target, dec.len())?;
                self.call_stack.push(Frame {
                    return_ip: *ip,
                    base: self.stack.len(),
                    locals: HashMap::new(),
                });
                *ip = target;
                Ok(Flow::Continue)
            }
            Ret => match self.call_stack.pop() {
                Some(frame) => {
                    *ip = frame.return_ip;
                    Ok(Flow::Continue)
                }
                None => Ok(Flow::Return),
            },
            CastInt => {
                let v = self.pop()?;
                self.push(v.cast_int()?);
                Ok(Flow::Continue)
            }
            CastFloat => {
                let v = self.pop()?;
                self.push(v.cast_float()?);
                Ok(Flow::Continue)
            }
            ArrayNew => {
                let n = self.pop()?.to_int()?;
                let len = if n > 0 { n as usize } else { 0 };
                let mut items = Vec::with_capacity(len);
                for _ in 0..len {
                    items.push(Value::Null);
                }
                self.push(Value::Array(items));
                Ok(Flow::Continue)
            }
            ArrayGet | ArraySet => Err(VmError::InvalidOpcode(opcode.as_byte())),
            ArrayLen => {
                let v = self.pop()?;
                let n = v.array_len()?;
                self.push(Value::Integer(n));
                Ok(Flow::Continue)
            }
            BuildList | BuildTuple => {
                let count = dec.read_u64(ip)? as usize;
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(self.pop()?);
                }
                items.reverse();
                self.push(Value::Array(items));
                Ok(Flow::Continue)
            }
            BuildDict => {
                // Placeholder: discard the key/value pairs and push an
                // empty array. Not a bug to fix here.
                let count = dec.read_u64(ip)? as usize;
                for _ in 0..2 * count {
                    self.pop()?;
                }
                self.push(Value::Array(Vec::new()));
                Ok(Flow::Continue)
            }
            IsNull => {
                let v = self.pop()?;
                self.push(Value::Boolean(matches!(v, Value::Null)));
                Ok(Flow::Continue)
            }
            LoopStart => {
                self.exec_loop(dec, ip, out, input)?;
                Ok(Flow::Continue)
            }
            // Only reached directly when a recursive `execute` walks off
            // the tail of a loop body slice; the terminator byte at that
            // position is this opcode. Ends the current call, same as
            // running out of bytes would.
            LoopEnd => Ok(Flow::Return),
        }
    }

    // LOOP_START: scan forward (operand-aware, nesting-tracked) for the
    // matching LOOP_END, then recursively execute that body once per
    // index in [start, end). The recursive slice includes the LOOP_END
    // byte itself, so the nested `execute` terminates on it naturally.
    fn exec_loop<W: Write, R: BufRead>(
        &mut self,
        dec: &Decoder,
        ip: &mut usize,
        out: &mut W,
        input: &mut R,
    ) -> Result<()> {
        let start = dec.read_u64(ip)?;
        let end = dec.read_u64(ip)?;
        let body_start = *ip;
        let loop_end_ip = find_matching_loop_end(dec, body_start)?;
        let body = &dec.raw()[body_start..=loop_end_ip];
        for i in start..end {
            self.current_loop_index = i as i64;
            self.execute(body, out, input)?;
        }
        *ip = loop_end_ip + 1;
        Ok(())
    }

    fn binary<F>(&mut self, f: F) -> Result<Flow>
    where
        F: Fn(&Value, &Value) -> Result<Value>,
    {
        let b = self.pop()?;
        let a = self.pop()?;
        let result = f(&a, &b)?;
        self.push(result);
        Ok(Flow::Continue)
    }

    fn binary_bool<F>(&mut self, f: F) -> Result<Flow>
    where
        F: Fn(&Value, &Value) -> bool,
    {
        let b = self.pop()?;
        let a = self.pop()?;
        self.push(Value::Boolean(f(&a, &b)));
        Ok(Flow::Continue)
    }

    fn push(&mut self, v: Value) {
        self.stack.push(v);
    }

    fn pop(&mut self) -> Result<Value> {
        self.stack.pop().ok_or(VmError::StackUnderflow)
    }

    fn peek(&self) -> Result<&Value> {
        self.stack.last().ok_or(VmError::StackUnderflow)
    }

    // LOAD_VAR: current frame's locals, then globals, then a fresh
    // Integer(0), always a deep copy, never aliased.
    fn lookup(&self, name: &[u8]) -> Value {
        if let Some(frame) = self.call_stack.last() {
            if let Some(v) = frame.locals.get(name) {
                return v.deep_clone();
            }
        }
        match self.globals.get(name) {
            Some(v) => v.deep_clone(),
            None => Value::Integer(0),
        }
    }

    // STORE: rebinding drops whatever was previously bound under the
    // name (HashMap::insert returns and drops the old value).
    fn bind(&mut self, name: Vec<u8>, value: Value) {
        if let Some(frame) = self.call_stack.last_mut() {
            frame.locals.insert(name, value);
        } else {
            self.globals.insert(name, value);
        }
    }
}

impl Default for Vm {
    fn default() -> Vm {
        Vm::new()
    }
}

fn check_jump(target: u64, len: usize) -> Result<usize> {
    let target = target as usize;
    if target > len {
        return Err(VmError::InvalidJump { target, len });
    }
    Ok(target)
}

fn find_matching_loop_end(dec: &Decoder, start: usize) -> Result<usize> {
    let mut depth = 0usize;
    let mut ip = start;
    loop {
        if ip >= dec.len() {
            return Err(VmError::UnexpectedEof);
        }
        let len = dec.instruction_len(ip)?;
        let op_byte = dec.raw()[ip];
        match Opcode::from_byte(op_byte) {
            Some(Opcode::LoopStart) => depth += 1,
            Some(Opcode::LoopEnd) => {
                if depth == 0 {
                    return Ok(ip);
                }
                depth -= 1;
            }
            _ => {}
        }
        ip += len;
    }
}

// STDIN: a line up to and excluding the first '\n', capped at 1024
// bytes. EOF with no bytes read yields an empty string.
fn read_stdin_line<R: BufRead>(input: &mut R) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    input
        .read_until(b'\n', &mut buf)
        .map_err(|_| VmError::UnexpectedEof)?;
    if buf.last() == Some(&b'\n') {
        buf.pop();
    }
    buf.truncate(1024);
    Ok(buf)
}
