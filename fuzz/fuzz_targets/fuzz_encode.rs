#![no_main]
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use z80_mc::{encode, ExprRef, Instruction, Opcode, Operand, Register, MAX_INSTR_LEN};

// Every register and opcode, reachable from arbitrary bytes.
const REGISTERS: [Register; 18] = [
    Register::A,
    Register::B,
    Register::C,
    Register::D,
    Register::E,
    Register::H,
    Register::L,
    Register::Ixh,
    Register::Ixl,
    Register::Iyh,
    Register::Iyl,
    Register::Bc,
    Register::De,
    Register::Hl,
    Register::Af,
    Register::Ix,
    Register::Iy,
    Register::Sp,
];

const OPCODES: [Opcode; 26] = [
    Opcode::Add8ar,
    Opcode::Add8ai,
    Opcode::Add8ao,
    Opcode::Add8ap,
    Opcode::Sub8ar,
    Opcode::And8ar,
    Opcode::Xor8ar,
    Opcode::Or8ar,
    Opcode::Cp8ar,
    Opcode::Inc8r,
    Opcode::Dec8r,
    Opcode::Rl8r,
    Opcode::Srl8o,
    Opcode::Bit8bg,
    Opcode::Res8bo,
    Opcode::Set8bp,
    Opcode::Ld8gg,
    Opcode::Ld8go,
    Opcode::Ld8gp,
    Opcode::Ld8ri,
    Opcode::Ld16ri,
    Opcode::Lea16ro,
    Opcode::Call16,
    Opcode::Call16Cc,
    Opcode::Jq,
    Opcode::JqCc,
];

#[derive(Arbitrary, Debug)]
enum FuzzOperand {
    Reg(u8),
    Imm(i64),
    Sym(u8),
}

#[derive(Arbitrary, Debug)]
struct FuzzInstr {
    opcode: u8,
    operands: Vec<FuzzOperand>,
    ts_flags: u32,
}

fuzz_target!(|input: FuzzInstr| {
    let operands = input
        .operands
        .iter()
        .take(4)
        .map(|op| match op {
            FuzzOperand::Reg(i) => Operand::Reg(REGISTERS[*i as usize % REGISTERS.len()]),
            FuzzOperand::Imm(v) => Operand::Imm(*v),
            FuzzOperand::Sym(i) => Operand::Expr(ExprRef::symbol(match i % 3 {
                0 => "a",
                1 => "loop",
                _ => "main",
            })),
        })
        .collect();

    let mut mi = Instruction::new(
        OPCODES[input.opcode as usize % OPCODES.len()],
        operands,
    );
    mi.ts_flags = input.ts_flags;

    // The encoder must never panic, and accepted encodings must respect the
    // documented length bound.
    let mut bytes = Vec::new();
    let mut fixups = Vec::new();
    if encode(&mi, &mut bytes, &mut fixups).is_ok() {
        assert!(bytes.len() <= MAX_INSTR_LEN);
        for fixup in &fixups {
            assert!((fixup.offset_in_instruction as usize) < bytes.len());
        }
    }
});
