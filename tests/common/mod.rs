//! A small 68000 subset machine that runs the compiler's output.
//!
//! Only the instruction forms the code generator produces are understood.
//! `READ`, `WRITE`, `MUL32` and `DIV32` are built in. Execution starts at
//! `MAIN` and halts at `DC WARMST`, `END MAIN` or the end of the listing.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};

const MEMORY_SIZE: usize = 0x10000;
const DATA_BASE: u32 = 0x1000;
const STEP_LIMIT: usize = 2_000_000;

#[derive(Debug, Clone, Copy)]
struct Global {
  addr: u32,
  size: u32,
}

pub struct Machine {
  d: [u32; 8],
  a0: u32,
  a6: u32,
  sp: u32,
  mem: Vec<u8>,
  program: Vec<String>,
  labels: HashMap<String, usize>,
  globals: HashMap<String, Global>,
  /// Operands of the last CMP/TST as (destination, source), sign-extended.
  flags: (i64, i64),
  input: VecDeque<i32>,
  output: Vec<i32>,
  pub steps: usize,
}

fn mask(size: u32) -> u32 {
  match size {
    1 => 0xFF,
    2 => 0xFFFF,
    _ => 0xFFFF_FFFF,
  }
}

fn sext(value: u32, size: u32) -> i64 {
  match size {
    1 => value as u8 as i8 as i64,
    2 => value as u16 as i16 as i64,
    _ => value as i32 as i64,
  }
}

fn size_of(suffix: Option<&str>) -> u32 {
  match suffix {
    Some("B") => 1,
    Some("L") => 4,
    _ => 2,
  }
}

fn immediate(text: &str) -> i64 {
  let text = text.trim_start_matches('#');
  let (negative, digits) = match text.strip_prefix('-') {
    Some(rest) => (true, rest),
    None => (false, text),
  };
  let value = match digits.strip_prefix('$') {
    Some(hex) => i64::from_str_radix(hex, 16).expect("hex immediate"),
    None => digits.parse::<i64>().expect("decimal immediate"),
  };
  if negative { -value } else { value }
}

impl Machine {
  pub fn load(asm: &str, input: &[i32]) -> Self {
    let mut machine = Self {
      d: [0; 8],
      a0: 0,
      a6: 0,
      sp: MEMORY_SIZE as u32,
      mem: vec![0; MEMORY_SIZE],
      program: Vec::new(),
      labels: HashMap::new(),
      globals: HashMap::new(),
      flags: (0, 0),
      input: input.iter().copied().collect(),
      output: Vec::new(),
      steps: 0,
    };
    let mut next_data = DATA_BASE;

    for line in asm.lines() {
      if line.is_empty() || line.starts_with('*') || line.contains("EQU") {
        continue;
      }
      if let Some(instr) = line.strip_prefix('\t') {
        machine.program.push(instr.trim().to_string());
        continue;
      }
      if let Some((name, decl)) = line.split_once(":\t") {
        let (directive, value) = decl.split_once(' ').expect("DC operand");
        let size = size_of(directive.split_once('.').map(|(_, s)| s));
        let global = Global {
          addr: next_data,
          size,
        };
        machine.write_mem(global.addr, size, immediate(value) as u32);
        machine.globals.insert(name.to_string(), global);
        next_data += size.max(2);
        continue;
      }
      let label = line.strip_suffix(':').expect("label line");
      machine.labels.insert(label.to_string(), machine.program.len());
    }
    machine
  }

  /// Run from `MAIN` until the program stops.
  pub fn run(&mut self) {
    let mut pc = *self.labels.get("MAIN").expect("MAIN label");
    while pc < self.program.len() {
      self.steps += 1;
      assert!(self.steps < STEP_LIMIT, "step limit exceeded");
      let instr = self.program[pc].clone();
      pc += 1;
      match self.step(&instr, pc) {
        Step::Next => {}
        Step::Jump(target) => pc = target,
        Step::Halt => return,
      }
    }
  }

  pub fn output(&self) -> &[i32] {
    &self.output
  }

  pub fn sp(&self) -> u32 {
    self.sp
  }

  /// Value of a global, sign-extended from its declared size.
  pub fn global(&self, name: &str) -> i64 {
    let global = self.globals[name];
    sext(self.read_mem(global.addr, global.size), global.size)
  }

  pub fn labels(&self) -> impl Iterator<Item = &str> {
    self.labels.keys().map(String::as_str)
  }

  fn label(&self, name: &str) -> usize {
    *self
      .labels
      .get(name)
      .unwrap_or_else(|| panic!("unknown label {name}"))
  }

  fn step(&mut self, instr: &str, pc: usize) -> Step {
    let (op, args) = instr.split_once(' ').unwrap_or((instr, ""));
    let (base, suffix) = match op.split_once('.') {
      Some((base, suffix)) => (base, Some(suffix)),
      None => (op, None),
    };
    let size = size_of(suffix);
    let args: Vec<&str> = args.split(',').collect();

    match base {
      "DC" | "END" => return Step::Halt,
      "MOVE" => {
        let value = self.read(args[0], size);
        self.write(args[1], size, value);
      }
      "LEA" => {
        let name = args[0].trim_end_matches("(PC)");
        self.a0 = self.globals[name].addr;
      }
      "CLR" => self.write(args[0], size, 0),
      "NEG" => {
        let value = self.read(args[0], size);
        self.write(args[0], size, value.wrapping_neg());
      }
      "NOT" => {
        let value = self.read(args[0], size);
        self.write(args[0], size, !value);
      }
      "EXT" => {
        let reg = reg_index(args[0]);
        let value = self.d[reg];
        self.d[reg] = if size == 4 {
          sext(value, 2) as u32
        } else {
          (value & 0xFFFF_0000) | (sext(value, 1) as u32 & 0xFFFF)
        };
      }
      "ADD" | "ADDQ" | "SUB" | "SUBQ" if args[1] == "SP" => {
        let amount = immediate(args[0]) as u32;
        self.sp = if base.starts_with("ADD") {
          self.sp.wrapping_add(amount)
        } else {
          self.sp.wrapping_sub(amount)
        };
      }
      "ADD" | "ADDQ" | "SUB" | "SUBQ" | "AND" | "OR" | "EOR" => {
        let src = self.read(args[0], size);
        let dst = self.read(args[1], size);
        let value = match base {
          "ADD" | "ADDQ" => dst.wrapping_add(src),
          "SUB" | "SUBQ" => dst.wrapping_sub(src),
          "AND" => dst & src,
          "OR" => dst | src,
          _ => dst ^ src,
        };
        self.write(args[1], size, value);
      }
      "MULS" => {
        let src = sext(self.read(args[0], 2), 2);
        let dst = sext(self.read(args[1], 2), 2);
        self.write(args[1], 4, (src * dst) as u32);
      }
      "DIVS" => {
        let divisor = sext(self.read(args[0], 2), 2);
        let dividend = sext(self.read(args[1], 4), 4);
        assert!(divisor != 0, "divide by zero");
        let quotient = dividend / divisor;
        let remainder = dividend % divisor;
        // On overflow the destination is left unchanged.
        if (i16::MIN as i64..=i16::MAX as i64).contains(&quotient) {
          let packed = ((remainder as u32 & 0xFFFF) << 16) | (quotient as u32 & 0xFFFF);
          self.write(args[1], 4, packed);
        }
      }
      "CMP" => {
        let src = sext(self.read(args[0], size), size);
        let dst = sext(self.read(args[1], size), size);
        self.flags = (dst, src);
      }
      "TST" => {
        let value = sext(self.read(args[0], size), size);
        self.flags = (value, 0);
      }
      "DBRA" => {
        let counter = (self.read(args[0], 2) as u16).wrapping_sub(1);
        self.write(args[0], 2, counter as u32);
        if counter != 0xFFFF {
          return Step::Jump(self.label(args[1]));
        }
      }
      "BRA" => return Step::Jump(self.label(args[0])),
      "BSR" | "JSR" => match args[0] {
        "READ" => {
          let value = self.input.pop_front().expect("READ past end of input");
          self.d[0] = value as u32;
        }
        "WRITE" => self.output.push(self.d[0] as i32),
        "MUL32" => self.d[0] = (self.d[0] as i32).wrapping_mul(self.d[7] as i32) as u32,
        "DIV32" => {
          let divisor = self.d[0] as i32;
          assert!(divisor != 0, "divide by zero");
          self.d[0] = (self.d[7] as i32).wrapping_div(divisor) as u32;
        }
        name => {
          self.sp -= 4;
          self.write_mem(self.sp, 4, pc as u32);
          return Step::Jump(self.label(name));
        }
      },
      "RTS" => {
        let target = self.read_mem(self.sp, 4) as usize;
        self.sp += 4;
        return Step::Jump(target);
      }
      "LINK" => {
        self.sp -= 4;
        self.write_mem(self.sp, 4, self.a6);
        self.a6 = self.sp;
        self.sp = self.sp.wrapping_add(immediate(args[1]) as u32);
      }
      "UNLK" => {
        self.sp = self.a6;
        self.a6 = self.read_mem(self.sp, 4);
        self.sp += 4;
      }
      _ if base.starts_with('S') => {
        let value = if self.condition(&base[1..]) { 0xFF } else { 0 };
        self.write(args[0], 1, value);
      }
      _ if base.starts_with('B') => {
        if self.condition(&base[1..]) {
          return Step::Jump(self.label(args[0]));
        }
      }
      _ => panic!("unsupported instruction {instr}"),
    }
    Step::Next
  }

  fn condition(&self, cc: &str) -> bool {
    let (dst, src) = self.flags;
    match cc {
      "EQ" => dst == src,
      "NE" => dst != src,
      "GT" => dst > src,
      "LT" => dst < src,
      "GE" => dst >= src,
      "LE" => dst <= src,
      other => panic!("unsupported condition {other}"),
    }
  }

  fn address(&mut self, operand: &str, size: u32) -> u32 {
    match operand {
      "-(SP)" => {
        self.sp -= size.max(2);
        self.sp
      }
      "(SP)+" => {
        let addr = self.sp;
        self.sp += size.max(2);
        addr
      }
      "(SP)" => self.sp,
      "(A0)" => self.a0,
      _ => {
        if let Some(name) = operand.strip_suffix("(PC)") {
          return self.globals[name].addr;
        }
        if let Some(offset) = operand.strip_suffix("(A6)") {
          let offset: i32 = offset.parse().expect("frame offset");
          return self.a6.wrapping_add(offset as u32);
        }
        panic!("unsupported operand {operand}");
      }
    }
  }

  fn read(&mut self, operand: &str, size: u32) -> u32 {
    if operand.starts_with('#') {
      return immediate(operand) as u32 & mask(size);
    }
    if operand.starts_with('D') {
      return self.d[reg_index(operand)] & mask(size);
    }
    let addr = self.address(operand, size);
    self.read_mem(addr, size)
  }

  fn write(&mut self, operand: &str, size: u32, value: u32) {
    if operand.starts_with('D') {
      let reg = reg_index(operand);
      let keep = !mask(size);
      self.d[reg] = (self.d[reg] & keep) | (value & mask(size));
      return;
    }
    let addr = self.address(operand, size);
    self.write_mem(addr, size, value);
  }

  fn read_mem(&self, addr: u32, size: u32) -> u32 {
    (0..size).fold(0, |acc, i| {
      (acc << 8) | self.mem[(addr + i) as usize] as u32
    })
  }

  fn write_mem(&mut self, addr: u32, size: u32, value: u32) {
    for i in 0..size {
      let shift = 8 * (size - 1 - i);
      self.mem[(addr + i) as usize] = (value >> shift) as u8;
    }
  }
}

enum Step {
  Next,
  Jump(usize),
  Halt,
}

fn reg_index(operand: &str) -> usize {
  match operand {
    "D0" => 0,
    "D7" => 7,
    other => panic!("unsupported register {other}"),
  }
}

/// Compile `src` with default options and run it to completion.
pub fn run(src: &str, input: &[i32]) -> Machine {
  let asm = kissc::generate_assembly(src).unwrap_or_else(|err| panic!("{}", err.render()));
  let mut machine = Machine::load(&asm, input);
  machine.run();
  machine
}
