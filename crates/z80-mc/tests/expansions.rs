//! Index-half synthetic expansions and the error taxonomy.
//!
//! The Z80 cannot address IXH/IXL/IYH/IYL in most operations, so the
//! encoder spills through the stack and the HL/DE pairs. The exact byte
//! sequences below are ABI: downstream size estimators and debuggers
//! pattern-match them.

use z80_mc::{
    encode_to_vec, ts_flags, EncodeError, ExprRef, Instruction, Opcode, Operand, Register,
};

fn enc(opcode: Opcode, operands: Vec<Operand>) -> Vec<u8> {
    encode_to_vec(&Instruction::new(opcode, operands))
        .expect("encoding failed")
        .0
}

fn err(opcode: Opcode, operands: Vec<Operand>) -> EncodeError {
    encode_to_vec(&Instruction::new(opcode, operands))
        .expect_err("encoding unexpectedly succeeded")
}

fn reg(r: Register) -> Operand {
    Operand::Reg(r)
}

fn imm(v: i64) -> Operand {
    Operand::Imm(v)
}

// ============================================================================
// ALU on index halves: read-only shuttle through HL
// ============================================================================

/// ADD A, IXH — PUSH HL; PUSH IX; POP HL; ADD A, H; POP HL
#[test]
fn add_a_ixh() {
    assert_eq!(
        enc(Opcode::Add8ar, vec![reg(Register::Ixh)]),
        vec![0xE5, 0xDD, 0xE5, 0xE1, 0x84, 0xE1]
    );
}

/// ADD A, IYL — PUSH HL; PUSH IY; POP HL; ADD A, L; POP HL
#[test]
fn add_a_iyl() {
    assert_eq!(
        enc(Opcode::Add8ar, vec![reg(Register::Iyl)]),
        vec![0xE5, 0xFD, 0xE5, 0xE1, 0x85, 0xE1]
    );
}

/// ADC A, IXL — shuttles as ADC A, L
#[test]
fn adc_a_ixl() {
    assert_eq!(
        enc(Opcode::Adc8ar, vec![reg(Register::Ixl)]),
        vec![0xE5, 0xDD, 0xE5, 0xE1, 0x8D, 0xE1]
    );
}

/// SUB A, IYH — shuttles as SUB A, H
#[test]
fn sub_a_iyh() {
    assert_eq!(
        enc(Opcode::Sub8ar, vec![reg(Register::Iyh)]),
        vec![0xE5, 0xFD, 0xE5, 0xE1, 0x94, 0xE1]
    );
}

/// SBC A, IXH — shuttles as SBC A, H
#[test]
fn sbc_a_ixh() {
    assert_eq!(
        enc(Opcode::Sbc8ar, vec![reg(Register::Ixh)]),
        vec![0xE5, 0xDD, 0xE5, 0xE1, 0x9C, 0xE1]
    );
}

/// AND A, IXH — shuttles as AND A, H
#[test]
fn and_a_ixh() {
    assert_eq!(
        enc(Opcode::And8ar, vec![reg(Register::Ixh)]),
        vec![0xE5, 0xDD, 0xE5, 0xE1, 0xA4, 0xE1]
    );
}

/// XOR A, IYL — shuttles as XOR A, L
#[test]
fn xor_a_iyl() {
    assert_eq!(
        enc(Opcode::Xor8ar, vec![reg(Register::Iyl)]),
        vec![0xE5, 0xFD, 0xE5, 0xE1, 0xAD, 0xE1]
    );
}

/// OR A, IXL — shuttles as OR A, L
#[test]
fn or_a_ixl() {
    assert_eq!(
        enc(Opcode::Or8ar, vec![reg(Register::Ixl)]),
        vec![0xE5, 0xDD, 0xE5, 0xE1, 0xB5, 0xE1]
    );
}

/// CP A, IYH — shuttles as CP A, H
#[test]
fn cp_a_iyh() {
    assert_eq!(
        enc(Opcode::Cp8ar, vec![reg(Register::Iyh)]),
        vec![0xE5, 0xFD, 0xE5, 0xE1, 0xBC, 0xE1]
    );
}

// ============================================================================
// INC/DEC and shifts on index halves: write-back shuttle
// ============================================================================

/// INC IXH — the result is written back into IX
#[test]
fn inc_ixh() {
    assert_eq!(
        enc(Opcode::Inc8r, vec![reg(Register::Ixh)]),
        vec![0xE5, 0xDD, 0xE5, 0xE1, 0x24, 0xE5, 0xDD, 0xE1, 0xE1]
    );
}

/// DEC IYL — the result is written back into IY
#[test]
fn dec_iyl() {
    assert_eq!(
        enc(Opcode::Dec8r, vec![reg(Register::Iyl)]),
        vec![0xE5, 0xFD, 0xE5, 0xE1, 0x2D, 0xE5, 0xFD, 0xE1, 0xE1]
    );
}

/// RL IXH — CB-page op on H inside the write-back shuttle
#[test]
fn rl_ixh() {
    assert_eq!(
        enc(Opcode::Rl8r, vec![reg(Register::Ixh)]),
        vec![0xE5, 0xDD, 0xE5, 0xE1, 0xCB, 0x14, 0xE5, 0xDD, 0xE1, 0xE1]
    );
}

/// SRL IYL — CB-page op on L inside the write-back shuttle
#[test]
fn srl_iyl() {
    assert_eq!(
        enc(Opcode::Srl8r, vec![reg(Register::Iyl)]),
        vec![0xE5, 0xFD, 0xE5, 0xE1, 0xCB, 0x3D, 0xE5, 0xFD, 0xE1, 0xE1]
    );
}

/// RRC IXL — CB-page op on L inside the write-back shuttle
#[test]
fn rrc_ixl() {
    assert_eq!(
        enc(Opcode::Rrc8r, vec![reg(Register::Ixl)]),
        vec![0xE5, 0xDD, 0xE5, 0xE1, 0xCB, 0x0D, 0xE5, 0xDD, 0xE1, 0xE1]
    );
}

// ============================================================================
// BIT/RES/SET on index halves
// ============================================================================

/// BIT 2, IXH — emits the full restore shuffle
#[test]
fn bit_2_ixh() {
    assert_eq!(
        enc(Opcode::Bit8bg, vec![imm(2), reg(Register::Ixh)]),
        vec![0xE5, 0xDD, 0xE5, 0xE1, 0xCB, 0x54, 0xE5, 0xDD, 0xE1, 0xE1]
    );
}

/// RES 5, IXL — single POP HL tail
#[test]
fn res_5_ixl() {
    assert_eq!(
        enc(Opcode::Res8bg, vec![imm(5), reg(Register::Ixl)]),
        vec![0xE5, 0xDD, 0xE5, 0xE1, 0xCB, 0xAD, 0xE1]
    );
}

/// SET 0, IYH — single POP HL tail
#[test]
fn set_0_iyh() {
    assert_eq!(
        enc(Opcode::Set8bg, vec![imm(0), reg(Register::Iyh)]),
        vec![0xE5, 0xFD, 0xE5, 0xE1, 0xCB, 0xC4, 0xE1]
    );
}

// ============================================================================
// LD between registers and index halves
// ============================================================================

/// LD A, IXH — read via the HL shuttle
#[test]
fn ld_a_ixh() {
    assert_eq!(
        enc(Opcode::Ld8gg, vec![reg(Register::A), reg(Register::Ixh)]),
        vec![0xE5, 0xDD, 0xE5, 0xE1, 0x7C, 0xE1]
    );
}

/// LD C, IYL — read via the HL shuttle
#[test]
fn ld_c_iyl() {
    assert_eq!(
        enc(Opcode::Ld8gg, vec![reg(Register::C), reg(Register::Iyl)]),
        vec![0xE5, 0xFD, 0xE5, 0xE1, 0x4D, 0xE1]
    );
}

/// LD H, IXH — H participates, so the half shuttles via DE: LD H, D
#[test]
fn ld_h_ixh() {
    assert_eq!(
        enc(Opcode::Ld8gg, vec![reg(Register::H), reg(Register::Ixh)]),
        vec![0xD5, 0xDD, 0xE5, 0xD1, 0x62, 0xD1]
    );
}

/// LD L, IYL — LD L, E inside the DE shuttle
#[test]
fn ld_l_iyl() {
    assert_eq!(
        enc(Opcode::Ld8gg, vec![reg(Register::L), reg(Register::Iyl)]),
        vec![0xD5, 0xFD, 0xE5, 0xD1, 0x6B, 0xD1]
    );
}

/// LD IXH, A — write-back shuttle: LD H, A then IX restored from HL
#[test]
fn ld_ixh_a() {
    assert_eq!(
        enc(Opcode::Ld8gg, vec![reg(Register::Ixh), reg(Register::A)]),
        vec![0xE5, 0xDD, 0xE5, 0xE1, 0x67, 0xE5, 0xDD, 0xE1, 0xE1]
    );
}

/// LD IYL, B — write-back shuttle: LD L, B then IY restored
#[test]
fn ld_iyl_b() {
    assert_eq!(
        enc(Opcode::Ld8gg, vec![reg(Register::Iyl), reg(Register::B)]),
        vec![0xE5, 0xFD, 0xE5, 0xE1, 0x68, 0xE5, 0xFD, 0xE1, 0xE1]
    );
}

/// LD IXH, H — source is H, so the DE shuttle carries the half: LD D, H
#[test]
fn ld_ixh_h() {
    assert_eq!(
        enc(Opcode::Ld8gg, vec![reg(Register::Ixh), reg(Register::H)]),
        vec![0xD5, 0xDD, 0xE5, 0xD1, 0x54, 0xD5, 0xDD, 0xE1, 0xD1]
    );
}

/// LD IXL, L — LD E, L inside the DE write-back shuttle
#[test]
fn ld_ixl_l() {
    assert_eq!(
        enc(Opcode::Ld8gg, vec![reg(Register::Ixl), reg(Register::L)]),
        vec![0xD5, 0xDD, 0xE5, 0xD1, 0x5D, 0xD5, 0xDD, 0xE1, 0xD1]
    );
}

/// LD IXH, IXL — same index register: plain HL write-back shuttle, LD H, L
#[test]
fn ld_ixh_ixl() {
    assert_eq!(
        enc(Opcode::Ld8gg, vec![reg(Register::Ixh), reg(Register::Ixl)]),
        vec![0xE5, 0xDD, 0xE5, 0xE1, 0x65, 0xE5, 0xDD, 0xE1, 0xE1]
    );
}

/// LD IYH, IYH — degenerate same-half move still emits the full shuttle
#[test]
fn ld_iyh_iyh() {
    assert_eq!(
        enc(Opcode::Ld8gg, vec![reg(Register::Iyh), reg(Register::Iyh)]),
        vec![0xE5, 0xFD, 0xE5, 0xE1, 0x64, 0xE5, 0xFD, 0xE1, 0xE1]
    );
}

/// LD IXH, IYL — cross-index: three shuttles nested, LD H, E in the middle
#[test]
fn ld_ixh_iyl() {
    assert_eq!(
        enc(Opcode::Ld8gg, vec![reg(Register::Ixh), reg(Register::Iyl)]),
        vec![
            0xE5, 0xD5, 0xDD, 0xE5, 0xE1, 0xFD, 0xE5, 0xD1, 0x63, 0xE5, 0xDD, 0xE1, 0xD1, 0xE1
        ]
    );
}

/// LD IYL, IXH — cross-index the other way: LD L, D
#[test]
fn ld_iyl_ixh() {
    assert_eq!(
        enc(Opcode::Ld8gg, vec![reg(Register::Iyl), reg(Register::Ixh)]),
        vec![
            0xE5, 0xD5, 0xFD, 0xE5, 0xE1, 0xDD, 0xE5, 0xD1, 0x6A, 0xE5, 0xFD, 0xE1, 0xD1, 0xE1
        ]
    );
}

/// LD IXH, 7 — immediate into a half via the write-back shuttle
#[test]
fn ld_ixh_imm() {
    assert_eq!(
        enc(Opcode::Ld8ri, vec![reg(Register::Ixh), imm(7)]),
        vec![0xE5, 0xDD, 0xE5, 0xE1, 0x26, 0x07, 0xE5, 0xDD, 0xE1, 0xE1]
    );
}

// ============================================================================
// LD between index halves and memory
// ============================================================================

/// LD IXH, (IY+3) — destination half shuttled, pointer read inside
#[test]
fn ld_ixh_iy_disp() {
    assert_eq!(
        enc(
            Opcode::Ld8go,
            vec![reg(Register::Ixh), reg(Register::Iy), imm(3)]
        ),
        vec![0xE5, 0xDD, 0xE5, 0xE1, 0xFD, 0x66, 0x03, 0xE5, 0xDD, 0xE1, 0xE1]
    );
}

/// LD (IX+1), IYH — source half shuttled into H, stored through IX
#[test]
fn ld_ix_disp_iyh() {
    assert_eq!(
        enc(
            Opcode::Ld8og,
            vec![reg(Register::Ix), imm(1), reg(Register::Iyh)]
        ),
        vec![0xE5, 0xFD, 0xE5, 0xE1, 0xDD, 0x74, 0x01, 0xE5, 0xFD, 0xE1, 0xE1]
    );
}

/// LD IXH, (HL) — HL is the pointer, so the half rides in DE: LD D, (HL)
#[test]
fn ld_ixh_hl_ind() {
    assert_eq!(
        enc(Opcode::Ld8gp, vec![reg(Register::Ixh), reg(Register::Hl)]),
        vec![0xD5, 0xDD, 0xE5, 0xD1, 0x56, 0xD5, 0xDD, 0xE1, 0xD1]
    );
}

/// LD IYL, (IX) — cross: IY half in DE, load through IX with zero disp
#[test]
fn ld_iyl_ix_ind() {
    assert_eq!(
        enc(Opcode::Ld8gp, vec![reg(Register::Iyl), reg(Register::Ix)]),
        vec![0xD5, 0xFD, 0xE5, 0xD1, 0xDD, 0x5E, 0x00, 0xD5, 0xFD, 0xE1, 0xD1]
    );
}

/// LD (HL), IYH — store only reads the half: no write-back, LD (HL), D
#[test]
fn ld_hl_ind_iyh() {
    assert_eq!(
        enc(Opcode::Ld8pg, vec![reg(Register::Hl), reg(Register::Iyh)]),
        vec![0xD5, 0xFD, 0xE5, 0xD1, 0x72, 0xD1]
    );
}

/// LD (IX), IXL — store through IX of its own low half: LD (IX+0), E
#[test]
fn ld_ix_ind_ixl() {
    assert_eq!(
        enc(Opcode::Ld8pg, vec![reg(Register::Ix), reg(Register::Ixl)]),
        vec![0xD5, 0xDD, 0xE5, 0xD1, 0xDD, 0x73, 0x00, 0xD1]
    );
}

// ============================================================================
// LEA expansion
// ============================================================================

/// LEA IX, (IX+5) — in-place: AF/BC saved, BC = zero-extended displacement
#[test]
fn lea_ix_ix() {
    assert_eq!(
        enc(
            Opcode::Lea16ro,
            vec![reg(Register::Ix), reg(Register::Ix), imm(5)]
        ),
        vec![0xF5, 0xC5, 0x06, 0x00, 0x0E, 0x05, 0xDD, 0x09, 0xC1, 0xF1]
    );
}

/// LEA BC, (IY+0) — result deposited into BC through the stack
#[test]
fn lea_bc_iy() {
    assert_eq!(
        enc(
            Opcode::Lea16ro,
            vec![reg(Register::Bc), reg(Register::Iy), imm(0)]
        ),
        vec![0xF5, 0x06, 0x00, 0x0E, 0x00, 0xFD, 0xE5, 0xFD, 0x09, 0xFD, 0xE5, 0xC1, 0xFD, 0xE1, 0xF1]
    );
}

/// LEA HL, (IX+7) — full save/restore of AF, BC, and IX
#[test]
fn lea_hl_ix() {
    assert_eq!(
        enc(
            Opcode::Lea16ro,
            vec![reg(Register::Hl), reg(Register::Ix), imm(7)]
        ),
        vec![
            0xF5, 0xC5, 0x06, 0x00, 0x0E, 0x07, 0xDD, 0xE5, 0xDD, 0x09, 0xDD, 0xE5, 0xE1, 0xDD,
            0xE1, 0xC1, 0xF1
        ]
    );
}

// ============================================================================
// Error taxonomy
// ============================================================================

/// Wrong operand count carries the mnemonic and both counts.
#[test]
fn operand_count_mismatch() {
    assert_eq!(
        err(Opcode::Add8ar, vec![]),
        EncodeError::OperandCount {
            mnemonic: "ADD8ar",
            expected: 1,
            actual: 0,
        }
    );
    assert_eq!(
        err(Opcode::Nop, vec![imm(1)]),
        EncodeError::OperandCount {
            mnemonic: "NOP",
            expected: 0,
            actual: 1,
        }
    );
}

/// Wrong operand tag names the offending operand.
#[test]
fn operand_kind_mismatch() {
    let e = err(Opcode::Add8ai, vec![reg(Register::A)]);
    assert!(matches!(e, EncodeError::OperandKind { mnemonic: "ADD8ai", .. }));
    assert_eq!(e.to_string(), "ADD8ai: Operand should be immediate.");

    let e = err(Opcode::Add8ao, vec![imm(0), imm(0)]);
    assert_eq!(e.to_string(), "ADD8ao: First operand should be register.");
}

/// A bit index of 8 is out of range.
#[test]
fn bit_index_out_of_range() {
    let e = err(Opcode::Bit8bg, vec![imm(8), reg(Register::B)]);
    assert_eq!(e.to_string(), "BIT8bg: First operand should be in range 0..7.");
}

/// A condition code of 8 is out of range.
#[test]
fn condition_code_out_of_range() {
    let e = err(Opcode::Ret16Cc, vec![imm(8)]);
    assert_eq!(e.to_string(), "RET16CC: Operand should be in range 0..7.");
}

/// A register outside the form's class is rejected with the allowed set.
#[test]
fn register_class_violations() {
    let e = err(Opcode::Add8ar, vec![reg(Register::Bc)]);
    assert_eq!(
        e.to_string(),
        "ADD8ar: Allowed registers are A, B, C, D, E, H, L."
    );

    let e = err(Opcode::Add8ap, vec![reg(Register::De)]);
    assert_eq!(e.to_string(), "ADD8ap: The only allowed register is HL.");

    let e = err(Opcode::Add8ao, vec![reg(Register::Hl), imm(0)]);
    assert_eq!(e.to_string(), "ADD8ao: Allowed registers are IX, IY.");

    let e = err(Opcode::Push16r, vec![reg(Register::Af)]);
    assert_eq!(
        e.to_string(),
        "PUSH16r: Allowed registers are BC, DE, HL, IX, IY."
    );
}

/// ADD16-family forms insist their tied operands match.
#[test]
fn tied_operand_mismatch() {
    let e = err(Opcode::Add16Sp, vec![reg(Register::Hl), reg(Register::Ix)]);
    assert_eq!(
        e.to_string(),
        "ADD16SP: Both operands should be the same register."
    );

    let e = err(
        Opcode::Add16ao,
        vec![reg(Register::Hl), reg(Register::Ix), reg(Register::Bc)],
    );
    assert_eq!(
        e.to_string(),
        "ADD16ao: First two of the operands should be the same register."
    );
}

/// EZ80-mode instructions are rejected outright.
#[test]
fn ez80_mode_rejected() {
    let mut mi = Instruction::new(Opcode::Nop, vec![]);
    mi.ts_flags = (mi.ts_flags & !ts_flags::MODE_MASK) | ts_flags::EZ80_MODE;
    assert_eq!(encode_to_vec(&mi), Err(EncodeError::Ez80Mode));
}

/// The recognized-but-unencoded forms all fail with "Not implemented."
#[test]
fn not_implemented_forms() {
    for opcode in [
        Opcode::Adc16Sp,
        Opcode::Adc16aa,
        Opcode::Adc16ao,
        Opcode::Jp16,
        Opcode::Jp16Cc,
        Opcode::Jr,
        Opcode::JrCc,
        Opcode::Ld16or,
        Opcode::Ld16pr,
        Opcode::Ld16ro,
        Opcode::Ld16rp,
    ] {
        assert_eq!(
            err(opcode, vec![]),
            EncodeError::NotImplemented {
                mnemonic: opcode.mnemonic()
            },
            "{}",
            opcode
        );
    }
}

/// JQ requires an expression operand.
#[test]
fn jq_requires_expression() {
    let e = err(Opcode::Jq, vec![imm(0x1234)]);
    assert_eq!(e.to_string(), "JQ: Operand should be an expression.");
}

/// CALL16CC rejects complex expression targets.
#[test]
fn call_cc_rejects_complex_expr() {
    let e = err(
        Opcode::Call16Cc,
        vec![Operand::Expr(ExprRef::complex("base")), imm(0)],
    );
    assert_eq!(
        e.to_string(),
        "CALL16CC: First operand expression should be a call target."
    );
}
