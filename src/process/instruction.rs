//! The per-process instruction set.

use serde::{Deserialize, Serialize};

/// An operand that is either a variable name (resolved against the
/// process's symbol table) or an immediate 16-bit literal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    Var(String),
    Imm(u16),
}

impl Operand {
    pub fn var(name: impl Into<String>) -> Self {
        Self::Var(name.into())
    }

    pub const fn imm(value: u16) -> Self {
        Self::Imm(value)
    }
}

/// What a `PRINT` instruction writes to the process log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrintArg {
    Hello,
    Literal(String),
    Variable(String),
    /// `+`-delimited concatenation of quoted literals and variable names.
    Expression(Vec<ExprPart>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExprPart {
    Literal(String),
    Variable(String),
}

/// One instruction. `instructions.len()` inside a process is always flat
/// by the time it reaches the interpreter: `For` bodies are expanded by
/// [`flatten_program`] at submission time (`spec.md` §9 Design Notes,
/// option (b)), so the interpreter never executes a `For` directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    Declare { var: String, value: u16 },
    Add { dst: String, a: Operand, b: Operand },
    Sub { dst: String, a: Operand, b: Operand },
    Print(PrintArg),
    Sleep(u8),
    Read { dst: String, addr: Operand },
    Write { addr: Operand, value: Operand },
    /// Present only in a program handed to [`flatten_program`]; never
    /// appears in a `Process::instructions` list.
    For { body: Vec<Instruction>, count: u32 },
}

/// Expands every `For { body, count }` into `count` consecutive copies of
/// `body`, recursively for nested loops. The result contains no `For`
/// instructions.
pub fn flatten_program(instructions: Vec<Instruction>) -> Vec<Instruction> {
    let mut out = Vec::with_capacity(instructions.len());
    for instr in instructions {
        match instr {
            Instruction::For { body, count } => {
                let flat_body = flatten_program(body);
                for _ in 0..count {
                    out.extend(flat_body.iter().cloned());
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattens_simple_loop() {
        let program = vec![Instruction::For {
            body: vec![Instruction::Sleep(1)],
            count: 3,
        }];
        let flat = flatten_program(program);
        assert_eq!(flat, vec![Instruction::Sleep(1); 3]);
    }

    #[test]
    fn flattens_nested_loops() {
        let program = vec![Instruction::For {
            body: vec![Instruction::For {
                body: vec![Instruction::Sleep(2)],
                count: 2,
            }],
            count: 3,
        }];
        let flat = flatten_program(program);
        assert_eq!(flat, vec![Instruction::Sleep(2); 6]);
    }

    #[test]
    fn leaves_non_loop_instructions_untouched() {
        let program = vec![
            Instruction::Declare {
                var: "x".into(),
                value: 1,
            },
            Instruction::Print(PrintArg::Hello),
        ];
        let flat = flatten_program(program.clone());
        assert_eq!(flat, program);
    }
}
