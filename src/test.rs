use rstest::rstest;

use std::collections::BTreeMap;

use crate::analysis::{
    build_call_graph, detect_functions, Analysis, CallTarget, Function,
};
use crate::decode::{
    Decoder, Ins, MemRef, Mnemonic, Operand, Reg16, Reg8, Rep, SegReg, Width,
};
use crate::lift::{LiftedFunction, Lifter};
use crate::{strings, ExeImage};

fn decode_first(bytes: &[u8]) -> Ins {
    let mut decoder = Decoder::new(bytes, 0);
    decoder.decode_one().expect("input is not empty")
}

fn lift_one(name: &str, bytes: &[u8], func_start: usize) -> LiftedFunction {
    let mut decoder = Decoder::new(bytes, func_start);
    let instructions = decoder.decode_all();
    Lifter::new().lift_function(name, &instructions, func_start)
}

/// Minimal MZ image: a 32-byte header (2 paragraphs) followed by `resident`.
fn image_with_resident(resident: &[u8]) -> ExeImage {
    ExeImage::from_bytes(build_mz(resident)).unwrap()
}

fn build_mz(resident: &[u8]) -> Vec<u8> {
    let mut data = mz_header(resident.len());
    data.extend_from_slice(resident);
    data
}

fn mz_header(code_len: usize) -> Vec<u8> {
    let total = 32 + code_len;
    let pages = total.div_ceil(512) as u16;
    let last_page = (total % 512) as u16;
    let mut header = vec![0u8; 32];
    header[0] = 0x4D;
    header[1] = 0x5A;
    header[2..4].copy_from_slice(&last_page.to_le_bytes());
    header[4..6].copy_from_slice(&pages.to_le_bytes());
    header[8..10].copy_from_slice(&2u16.to_le_bytes());
    header
}

/// Append one overlay module (header plus `code`) at the next 512-byte
/// boundary.
fn append_overlay(data: &mut Vec<u8>, code: &[u8]) {
    let aligned = (data.len() + 0x1FF) & !0x1FF;
    data.resize(aligned, 0);
    let header = mz_header(code.len());
    data.extend_from_slice(&header);
    data.extend_from_slice(code);
}

// ---- container ----

#[test]
fn rejects_non_mz_input() {
    assert!(ExeImage::from_bytes(vec![0u8; 64]).is_err());
    assert!(ExeImage::from_bytes(vec![0x4D, 0x5A]).is_err());
}

#[test]
fn resident_window_follows_the_header() {
    let image = image_with_resident(&[0x90; 100]);
    assert_eq!(image.header_size(), 32);
    assert_eq!(image.image_size(), 132);
    assert_eq!(image.resident_range(), 32..132);
    assert_eq!(image.resident_code().len(), 100);
}

#[test]
fn overlay_scan_finds_chained_modules() {
    let mut data = build_mz(&[0x90; 40]);
    append_overlay(&mut data, &[0xC3; 16]);
    append_overlay(&mut data, &[0xC3; 8]);
    let image = ExeImage::from_bytes(data).unwrap();

    let overlays = image.find_overlays();
    assert_eq!(overlays.len(), 2);
    assert_eq!(overlays[0].index, 1);
    assert_eq!(overlays[0].file_offset, 512);
    assert_eq!(overlays[0].code_offset, 544);
    assert_eq!(overlays[0].code_size, 16);
    assert_eq!(overlays[1].index, 2);
    assert_eq!(overlays[1].file_offset, 1024);
    assert_eq!(overlays[1].code_offset, 1056);
    assert_eq!(overlays[1].code_size, 8);
}

#[test]
fn overlay_scan_skips_implausible_headers() {
    let mut data = build_mz(&[0x90; 40]);
    let aligned = (data.len() + 0x1FF) & !0x1FF;
    data.resize(aligned, 0);
    // MZ magic but a zero header-paragraph count fails the sanity bounds
    let mut bogus = vec![0u8; 64];
    bogus[0] = 0x4D;
    bogus[1] = 0x5A;
    bogus[4] = 1;
    data.extend_from_slice(&bogus);
    let image = ExeImage::from_bytes(data).unwrap();
    assert!(image.find_overlays().is_empty());
}

// ---- decoder length and round-trip laws ----

const MIXED_CODE: &[u8] = &[
    0xB8, 0x34, 0x12, // mov ax, 0x1234
    0x55, // push bp
    0x8B, 0xEC, // mov bp, sp
    0x26, 0xA1, 0x10, 0x00, // mov ax, word es:[0x10]
    0xF3, 0xA4, // rep movsb
    0xCD, 0x3F, 0x01, 0x00, 0x10, // overlay trap, module 1, entry 0x1000
    0x0F, // unknown opcode
    0xF0, // trailing lock prefix
];

#[test]
fn sweep_lengths_sum_to_range_length() {
    let mut decoder = Decoder::new(MIXED_CODE, 0);
    let instructions = decoder.decode_all();
    let total: usize = instructions.iter().map(|ins| ins.len).sum();
    assert_eq!(total, MIXED_CODE.len());
    for ins in &instructions {
        assert_eq!(ins.len, ins.raw.len());
    }
    // offsets are contiguous
    let mut expected = 0;
    for ins in &instructions {
        assert_eq!(ins.offset, expected);
        expected += ins.len;
    }
}

#[test]
fn trailing_prefix_becomes_raw_byte() {
    let mut decoder = Decoder::new(MIXED_CODE, 0);
    let instructions = decoder.decode_all();
    let last = instructions.last().unwrap();
    assert_eq!(last.mnemonic, Mnemonic::Db);
    assert_eq!(last.op1, Some(Operand::Imm8(0xF0)));
    assert_eq!(last.len, 1);
}

#[test]
fn resweep_from_instruction_start_is_prefix_equal() {
    let mut decoder = Decoder::new(MIXED_CODE, 0);
    let instructions = decoder.decode_all();
    for skip in 1..instructions.len() {
        let start = instructions[skip].addr;
        let mut again = Decoder::new(MIXED_CODE, 0);
        let tail = again.decode_range(start, MIXED_CODE.len());
        assert_eq!(&instructions[skip..], &tail[..]);
    }
}

// ---- decoder opcode coverage ----

#[rstest]
#[case::add_rm8_reg8(&[0x00, 0xD8], Mnemonic::Add)]
#[case::or_rm16_reg16(&[0x09, 0xC8], Mnemonic::Or)]
#[case::adc_reg8_rm8(&[0x12, 0xC1], Mnemonic::Adc)]
#[case::sbb_reg16_rm16(&[0x1B, 0xC1], Mnemonic::Sbb)]
#[case::and_al_imm8(&[0x24, 0x0F], Mnemonic::And)]
#[case::sub_ax_imm16(&[0x2D, 0x34, 0x12], Mnemonic::Sub)]
#[case::xor_rm16_reg16(&[0x31, 0xDB], Mnemonic::Xor)]
#[case::cmp_al_imm8(&[0x3C, 0x00], Mnemonic::Cmp)]
#[case::push_es(&[0x06], Mnemonic::Push)]
#[case::pop_es(&[0x07], Mnemonic::Pop)]
#[case::push_ds(&[0x1E], Mnemonic::Push)]
#[case::daa(&[0x27], Mnemonic::Daa)]
#[case::das(&[0x2F], Mnemonic::Das)]
#[case::aaa(&[0x37], Mnemonic::Aaa)]
#[case::aas(&[0x3F], Mnemonic::Aas)]
#[case::inc_cx(&[0x41], Mnemonic::Inc)]
#[case::dec_dx(&[0x4A], Mnemonic::Dec)]
#[case::push_bx(&[0x53], Mnemonic::Push)]
#[case::pop_bp(&[0x5D], Mnemonic::Pop)]
#[case::pusha(&[0x60], Mnemonic::Pusha)]
#[case::popa(&[0x61], Mnemonic::Popa)]
#[case::push_imm16(&[0x68, 0x00, 0x80], Mnemonic::Push)]
#[case::imul_imm16(&[0x69, 0xC0, 0x10, 0x00], Mnemonic::Imul)]
#[case::push_imm8(&[0x6A, 0xFF], Mnemonic::Push)]
#[case::imul_imm8(&[0x6B, 0xD9, 0x05], Mnemonic::Imul)]
#[case::je_short(&[0x74, 0x00], Mnemonic::Je)]
#[case::jg_short(&[0x7F, 0x00], Mnemonic::Jg)]
#[case::group1_add(&[0x80, 0xC3, 0x05], Mnemonic::Add)]
#[case::group1_sub_wide(&[0x81, 0xEC, 0x00, 0x01], Mnemonic::Sub)]
#[case::group1_sign_extended(&[0x83, 0xC4, 0x08], Mnemonic::Add)]
#[case::test_rm8_reg8(&[0x84, 0xC0], Mnemonic::Test)]
#[case::xchg_rm16_reg16(&[0x87, 0xD1], Mnemonic::Xchg)]
#[case::mov_rm8_reg8(&[0x88, 0xC4], Mnemonic::Mov)]
#[case::mov_rm16_sreg(&[0x8C, 0xD8], Mnemonic::Mov)]
#[case::lea(&[0x8D, 0x46, 0x04], Mnemonic::Lea)]
#[case::mov_sreg_rm16(&[0x8E, 0xC0], Mnemonic::Mov)]
#[case::pop_rm16(&[0x8F, 0x06, 0x34, 0x12], Mnemonic::Pop)]
#[case::nop(&[0x90], Mnemonic::Nop)]
#[case::xchg_ax_bx(&[0x93], Mnemonic::Xchg)]
#[case::cbw(&[0x98], Mnemonic::Cbw)]
#[case::cwd(&[0x99], Mnemonic::Cwd)]
#[case::call_far(&[0x9A, 0x34, 0x12, 0x78, 0x56], Mnemonic::Call)]
#[case::wait_prefix(&[0x9B], Mnemonic::Wait)]
#[case::pushf(&[0x9C], Mnemonic::Pushf)]
#[case::popf(&[0x9D], Mnemonic::Popf)]
#[case::sahf(&[0x9E], Mnemonic::Sahf)]
#[case::lahf(&[0x9F], Mnemonic::Lahf)]
#[case::mov_al_moffs(&[0xA0, 0x10, 0x00], Mnemonic::Mov)]
#[case::mov_moffs_ax(&[0xA3, 0x10, 0x00], Mnemonic::Mov)]
#[case::movsb(&[0xA4], Mnemonic::Movsb)]
#[case::cmpsw(&[0xA7], Mnemonic::Cmpsw)]
#[case::test_al_imm8(&[0xA8, 0x01], Mnemonic::Test)]
#[case::test_ax_imm16(&[0xA9, 0x01, 0x00], Mnemonic::Test)]
#[case::stosb(&[0xAA], Mnemonic::Stosb)]
#[case::lodsw(&[0xAD], Mnemonic::Lodsw)]
#[case::scasw(&[0xAF], Mnemonic::Scasw)]
#[case::mov_ch_imm8(&[0xB5, 0x07], Mnemonic::Mov)]
#[case::mov_si_imm16(&[0xBE, 0x00, 0x10], Mnemonic::Mov)]
#[case::shl_rm8_imm8(&[0xC0, 0xE0, 0x02], Mnemonic::Shl)]
#[case::ret_imm16(&[0xC2, 0x04, 0x00], Mnemonic::Ret)]
#[case::ret(&[0xC3], Mnemonic::Ret)]
#[case::les(&[0xC4, 0x06, 0x00, 0x20], Mnemonic::Les)]
#[case::lds(&[0xC5, 0x1E, 0x00, 0x20], Mnemonic::Lds)]
#[case::mov_rm8_imm8(&[0xC6, 0x06, 0x00, 0x20, 0x05], Mnemonic::Mov)]
#[case::mov_rm16_imm16(&[0xC7, 0x07, 0x34, 0x12], Mnemonic::Mov)]
#[case::enter(&[0xC8, 0x10, 0x00, 0x00], Mnemonic::Enter)]
#[case::leave(&[0xC9], Mnemonic::Leave)]
#[case::retf_imm16(&[0xCA, 0x02, 0x00], Mnemonic::Retf)]
#[case::retf(&[0xCB], Mnemonic::Retf)]
#[case::int3(&[0xCC], Mnemonic::Int)]
#[case::int_imm8(&[0xCD, 0x21], Mnemonic::Int)]
#[case::into(&[0xCE], Mnemonic::Into)]
#[case::iret(&[0xCF], Mnemonic::Iret)]
#[case::shr_rm8_1(&[0xD0, 0xE8], Mnemonic::Shr)]
#[case::shl_rm8_cl(&[0xD2, 0xE0], Mnemonic::Shl)]
#[case::sar_rm16_cl(&[0xD3, 0xF8], Mnemonic::Sar)]
#[case::aam(&[0xD4, 0x0A], Mnemonic::Aam)]
#[case::aad(&[0xD5, 0x0A], Mnemonic::Aad)]
#[case::xlat(&[0xD7], Mnemonic::Xlat)]
#[case::fpu_escape(&[0xD9, 0x06, 0x34, 0x12], Mnemonic::Esc(1))]
#[case::loopnz(&[0xE0, 0xFE], Mnemonic::Loopnz)]
#[case::loopz(&[0xE1, 0xFE], Mnemonic::Loopz)]
#[case::loop_short(&[0xE2, 0xFE], Mnemonic::Loop)]
#[case::jcxz(&[0xE3, 0x00], Mnemonic::Jcxz)]
#[case::in_al_imm8(&[0xE4, 0x60], Mnemonic::In)]
#[case::out_imm8_al(&[0xE6, 0x20], Mnemonic::Out)]
#[case::call_rel16(&[0xE8, 0x00, 0x00], Mnemonic::Call)]
#[case::jmp_rel16(&[0xE9, 0x00, 0x00], Mnemonic::Jmp)]
#[case::jmp_far(&[0xEA, 0x34, 0x12, 0x78, 0x56], Mnemonic::Jmp)]
#[case::jmp_rel8(&[0xEB, 0x00], Mnemonic::Jmp)]
#[case::in_al_dx(&[0xEC], Mnemonic::In)]
#[case::out_dx_ax(&[0xEF], Mnemonic::Out)]
#[case::hlt(&[0xF4], Mnemonic::Hlt)]
#[case::cmc(&[0xF5], Mnemonic::Cmc)]
#[case::group3_test_imm8(&[0xF6, 0xC0, 0x01], Mnemonic::Test)]
#[case::group3_neg(&[0xF7, 0xD8], Mnemonic::Neg)]
#[case::group3_mul(&[0xF7, 0xE1], Mnemonic::Mul)]
#[case::group3_idiv(&[0xF7, 0xF9], Mnemonic::Idiv)]
#[case::clc(&[0xF8], Mnemonic::Clc)]
#[case::stc(&[0xF9], Mnemonic::Stc)]
#[case::cli(&[0xFA], Mnemonic::Cli)]
#[case::sti(&[0xFB], Mnemonic::Sti)]
#[case::cld(&[0xFC], Mnemonic::Cld)]
#[case::std_flag(&[0xFD], Mnemonic::Std)]
#[case::group4_inc(&[0xFE, 0xC0], Mnemonic::Inc)]
#[case::group4_dec(&[0xFE, 0xC8], Mnemonic::Dec)]
#[case::group5_call_rm(&[0xFF, 0xD0], Mnemonic::Call)]
#[case::group5_call_far_rm(&[0xFF, 0x1E, 0x34, 0x12], Mnemonic::CallFar)]
#[case::group5_jmp_rm(&[0xFF, 0xE0], Mnemonic::Jmp)]
#[case::group5_jmp_far_rm(&[0xFF, 0x2E, 0x34, 0x12], Mnemonic::JmpFar)]
#[case::group5_push_rm(&[0xFF, 0x36, 0x34, 0x12], Mnemonic::Push)]
#[case::group5_undefined(&[0xFF, 0xF8], Mnemonic::Bad)]
fn opcode_mnemonic_and_length(
    #[case] bytes: &[u8],
    #[case] mnemonic: Mnemonic,
) {
    let ins = decode_first(bytes);
    assert_eq!(ins.mnemonic, mnemonic);
    assert_eq!(ins.len, bytes.len());
}

#[rstest]
#[case::pop_cs_gap(0x0F)]
#[case::bound_gap(0x62)]
#[case::arpl_gap(0x63)]
#[case::insb_gap(0x6C)]
#[case::outsw_gap(0x6F)]
#[case::salc_gap(0xD6)]
#[case::icebp_gap(0xF1)]
fn unlisted_opcodes_become_raw_bytes(#[case] opcode: u8) {
    let ins = decode_first(&[opcode]);
    assert_eq!(ins.mnemonic, Mnemonic::Db);
    assert_eq!(ins.op1, Some(Operand::Imm8(opcode)));
    assert_eq!(ins.len, 1);
}

#[test]
fn accumulator_immediate_shapes() {
    let ins = decode_first(&[0x24, 0x0F]);
    assert_eq!(ins.op1, Some(Operand::Reg8(Reg8::Al)));
    assert_eq!(ins.op2, Some(Operand::Imm8(0x0F)));

    let ins = decode_first(&[0x2D, 0x34, 0x12]);
    assert_eq!(ins.op1, Some(Operand::Reg16(Reg16::Ax)));
    assert_eq!(ins.op2, Some(Operand::Imm16(0x1234)));
}

#[test]
fn sign_extended_immediates_decode_as_imm16() {
    let ins = decode_first(&[0x6A, 0xFF]);
    assert_eq!(ins.op1, Some(Operand::Imm16(0xFFFF)));

    let ins = decode_first(&[0x83, 0xC4, 0xF8]);
    assert_eq!(ins.mnemonic, Mnemonic::Add);
    assert_eq!(ins.op1, Some(Operand::Reg16(Reg16::Sp)));
    assert_eq!(ins.op2, Some(Operand::Imm16(0xFFF8)));
}

#[test]
fn mov_rm16_sreg_shape() {
    let ins = decode_first(&[0x8C, 0xD8]);
    assert_eq!(ins.op1, Some(Operand::Reg16(Reg16::Ax)));
    assert_eq!(ins.op2, Some(Operand::Seg(SegReg::Ds)));
}

// ---- addressing ----

#[test]
fn direct_disp16_has_no_base_or_index() {
    let ins = decode_first(&[0x8B, 0x1E, 0x34, 0x12]);
    assert_eq!(ins.op1, Some(Operand::Reg16(Reg16::Bx)));
    assert_eq!(
        ins.op2,
        Some(Operand::Mem(MemRef {
            base: None,
            index: None,
            disp: 0x1234,
            seg: SegReg::Ds,
            width: Width::Word,
        }))
    );
}

#[test]
fn bp_si_defaults_to_stack_segment() {
    let ins = decode_first(&[0x8B, 0x42, 0xFC]);
    assert_eq!(ins.op1, Some(Operand::Reg16(Reg16::Ax)));
    assert_eq!(
        ins.op2,
        Some(Operand::Mem(MemRef {
            base: Some(Reg16::Bp),
            index: Some(Reg16::Si),
            disp: -4,
            seg: SegReg::Ss,
            width: Width::Word,
        }))
    );
}

#[test]
fn segment_override_replaces_the_default() {
    let ins = decode_first(&[0x26, 0x8B, 0x42, 0xFC]);
    assert_eq!(ins.seg_override, Some(SegReg::Es));
    assert_eq!(ins.len, 4);
    let Some(Operand::Mem(mem)) = ins.op2 else {
        panic!("expected a memory operand, got {:?}", ins.op2);
    };
    assert_eq!(mem.seg, SegReg::Es);
}

#[test]
fn mod3_selects_registers() {
    let ins = decode_first(&[0x8B, 0xC3]);
    assert_eq!(ins.op1, Some(Operand::Reg16(Reg16::Ax)));
    assert_eq!(ins.op2, Some(Operand::Reg16(Reg16::Bx)));
}

#[test]
fn moffs_honors_segment_override() {
    let ins = decode_first(&[0xA1, 0x34, 0x12]);
    assert_eq!(
        ins.op2,
        Some(Operand::Moffs {
            seg: SegReg::Ds,
            offset: 0x1234,
            width: Width::Word,
        })
    );

    let ins = decode_first(&[0x2E, 0xA1, 0x34, 0x12]);
    assert_eq!(
        ins.op2,
        Some(Operand::Moffs {
            seg: SegReg::Cs,
            offset: 0x1234,
            width: Width::Word,
        })
    );
}

#[test]
fn repeat_prefixes_are_recorded() {
    let ins = decode_first(&[0xF3, 0xA5]);
    assert_eq!(ins.rep, Some(Rep::Rep));
    assert_eq!(ins.mnemonic, Mnemonic::Movsw);
    assert_eq!(ins.len, 2);

    let ins = decode_first(&[0xF2, 0xAE]);
    assert_eq!(ins.rep, Some(Rep::Repnz));
    assert_eq!(ins.mnemonic, Mnemonic::Scasb);
}

// ---- branch target resolution ----

#[test]
fn short_forward_jump_resolves_past_the_instruction() {
    let mut data = vec![0x90u8; 0x102];
    data[0x100] = 0xEB;
    data[0x101] = 0x05;
    let mut decoder = Decoder::new(&data, 0);
    let instructions = decoder.decode_range(0x100, 0x102);
    assert_eq!(instructions.len(), 1);
    assert_eq!(instructions[0].op1, Some(Operand::Rel8(0x107)));
}

#[test]
fn short_backward_jump_resolves_to_its_own_start() {
    let mut data = vec![0x90u8; 0x202];
    data[0x200] = 0xEB;
    data[0x201] = 0xFE;
    let mut decoder = Decoder::new(&data, 0);
    let instructions = decoder.decode_range(0x200, 0x202);
    assert_eq!(instructions[0].op1, Some(Operand::Rel8(0x200)));
}

#[test]
fn near_call_target_is_next_address_plus_delta() {
    let ins = decode_first(&[0xE8, 0x1D, 0x00]);
    assert_eq!(ins.op1, Some(Operand::Rel16(0x20)));

    let ins = decode_first(&[0xE8, 0xFD, 0xFF]);
    assert_eq!(ins.op1, Some(Operand::Rel16(0x0000)));
}

// ---- overlay trap ----

#[test]
fn overlay_trap_is_one_five_byte_instruction() {
    let ins = decode_first(&[0xCD, 0x3F, 0x07, 0x34, 0x12]);
    assert_eq!(ins.mnemonic, Mnemonic::Int);
    assert_eq!(ins.op1, Some(Operand::Imm8(0x3F)));
    assert_eq!(ins.len, 5);
    let target = ins.overlay.expect("trap payload");
    assert_eq!(target.module, 7);
    assert_eq!(target.entry, 0x1234);
}

#[test]
fn truncated_overlay_trap_keeps_the_plain_interrupt() {
    let ins = decode_first(&[0xCD, 0x3F, 0x07, 0x34]);
    assert_eq!(ins.mnemonic, Mnemonic::Int);
    assert_eq!(ins.overlay, None);
    assert_eq!(ins.len, 2);
}

// ---- function analysis ----

#[test]
fn prologue_sweep_detects_adjacent_functions() {
    let mut data = vec![0u8; 0x1000];
    data.extend_from_slice(&[
        0x55, 0x8B, 0xEC, 0x83, 0xEC, 0x10, 0xC3, // push bp frame
        0x55, 0x8B, 0xEC, 0xC3, // frameless
    ]);
    let end = data.len();
    let functions = detect_functions(&data, 0x1000, end, 0);

    assert_eq!(functions.len(), 2);
    assert_eq!(functions[0].name, "res_001000");
    assert_eq!(functions[0].start, 0x1000);
    assert_eq!(functions[0].end, 0x1007);
    assert_eq!(functions[0].local_size, 0x10);
    assert_eq!(functions[0].inst_count, 4);
    assert_eq!(functions[1].name, "res_001007");
    assert_eq!(functions[0].end, functions[1].start);
    assert_eq!(functions[1].end, end);
    assert_eq!(functions[1].local_size, 0);
}

#[test]
fn code_before_the_first_prologue_is_not_recorded() {
    let data = [0x90, 0x90, 0xC3, 0x55, 0x8B, 0xEC, 0xC3];
    let functions = detect_functions(&data, 0, data.len(), 0);
    assert_eq!(functions.len(), 1);
    assert_eq!(functions[0].start, 3);
}

#[test]
fn far_return_marks_the_function_far() {
    let data = [0x55, 0x8B, 0xEC, 0xCB];
    let functions = detect_functions(&data, 0, data.len(), 0);
    assert!(functions[0].is_far);
}

#[test]
fn repeated_near_calls_record_one_caller() {
    let data = [
        0x55, 0x8B, 0xEC, // f0 prologue
        0xE8, 0x04, 0x00, // call 0x0A
        0xE8, 0x01, 0x00, // call 0x0A again
        0xC3, // ret
        0x55, 0x8B, 0xEC, 0xC3, // f1
    ];
    let mut functions = detect_functions(&data, 0, data.len(), 0);
    assert_eq!(functions.len(), 2);
    assert_eq!(
        functions[0].calls,
        vec![CallTarget::Near(0x0A), CallTarget::Near(0x0A)]
    );

    build_call_graph(&mut functions);
    assert_eq!(functions[1].called_by, vec!["res_000000".to_string()]);
    assert!(functions[0].called_by.is_empty());
}

#[test]
fn call_target_outside_every_function_is_dropped() {
    let data = [
        0x55, 0x8B, 0xEC, // prologue
        0xE8, 0x10, 0x10, // call far beyond the region
        0xC3,
    ];
    let mut functions = detect_functions(&data, 0, data.len(), 0);
    build_call_graph(&mut functions);
    assert!(functions[0].called_by.is_empty());
}

#[test]
fn far_calls_and_overlay_traps_are_recorded() {
    let data = [
        0x55, 0x8B, 0xEC, // prologue
        0x9A, 0x34, 0x12, 0x78, 0x56, // call 5678:1234
        0xCD, 0x3F, 0x02, 0x00, 0x04, // overlay trap, module 2, entry 0x400
        0xC3,
    ];
    let functions = detect_functions(&data, 0, data.len(), 0);
    assert_eq!(
        functions[0].calls,
        vec![CallTarget::Far {
            seg: 0x5678,
            off: 0x1234
        }]
    );
    assert_eq!(functions[0].overlay_calls, vec![(2, 0x0400)]);
}

#[test]
fn analysis_covers_resident_and_overlay_regions() {
    let resident = [
        0x55, 0x8B, 0xEC, // prologue
        0xCD, 0x3F, 0x01, 0x00, 0x10, // call into overlay 1
        0xC3,
    ];
    let overlay = [0x55, 0x8B, 0xEC, 0xCB];
    let mut data = build_mz(&resident);
    append_overlay(&mut data, &overlay);
    let image = ExeImage::from_bytes(data).unwrap();

    let analysis = Analysis::run(&image);
    assert_eq!(analysis.overlays.len(), 1);
    assert_eq!(analysis.functions.len(), 2);

    let resident_funcs: Vec<_> = analysis.resident_functions().collect();
    assert_eq!(resident_funcs.len(), 1);
    assert_eq!(resident_funcs[0].name, "res_000020");
    assert_eq!(resident_funcs[0].overlay_calls, vec![(1, 0x1000)]);

    let overlay_funcs: Vec<_> = analysis.overlay_functions(1).collect();
    assert_eq!(overlay_funcs.len(), 1);
    assert_eq!(overlay_funcs[0].name, "ovl01_000220");
    assert!(overlay_funcs[0].is_far);
    assert_eq!(overlay_funcs[0].end, 548);
}

// ---- strings ----

#[test]
fn printable_runs_shorter_than_four_are_skipped() {
    let image = image_with_resident(b"ab\0abc\0abcd\0tail");
    let table = strings::extract(&image);
    let expected: BTreeMap<usize, String> =
        [(39, "abcd".to_string()), (44, "tail".to_string())]
            .into_iter()
            .collect();
    assert_eq!(table, expected);
}

#[test]
fn keyword_order_decides_the_category() {
    assert_eq!(strings::category_of("VGA palette"), Some("gfx"));
    assert_eq!(strings::category_of("Save the city"), Some("game"));
    assert_eq!(strings::category_of("Mouse driver"), Some("input"));
    assert_eq!(strings::category_of("no match"), None);
}

#[test]
fn first_matching_string_in_range_tags_the_function() {
    let mut functions = vec![
        Function {
            name: "res_000020".into(),
            start: 0x20,
            end: 0x40,
            ..Function::default()
        },
        Function {
            name: "res_000040".into(),
            start: 0x40,
            end: 0x60,
            ..Function::default()
        },
    ];
    let table: BTreeMap<usize, String> = [
        (0x22, "nothing of note".to_string()),
        (0x28, "Mouse driver".to_string()),
        (0x30, "Save game".to_string()),
    ]
    .into_iter()
    .collect();
    strings::categorize(&mut functions, &table);
    assert_eq!(functions[0].category, Some("input"));
    assert_eq!(functions[1].category, None);
}

// ---- lifter ----

#[test]
fn frame_prologue_lifts_to_stack_setup() {
    let lifted = lift_one(
        "res_000000",
        &[0x55, 0x8B, 0xEC, 0x83, 0xEC, 0x10, 0x8B, 0x46, 0xFC, 0x5D, 0xC3],
        0,
    );
    let lines: Vec<&str> = lifted.code.lines().collect();
    assert!(lines[2].contains("push16(cpu, cpu.bp);"));
    assert!(lines[3].contains("cpu.bp = (uint16_t)(cpu.sp);"));
    assert!(lines[4].contains("flags_sub16(cpu, cpu.sp, 0x10)"));
    // [bp-4] reads through the stack segment by default
    assert!(lifted
        .code
        .contains("mem_read16(cpu, cpu.ss, (uint16_t)(cpu.bp - 0x4))"));
    assert!(lifted.code.contains("return;"));
}

#[test]
fn rep_movsw_lifts_to_a_counted_loop() {
    let lifted = lift_one("res_000000", &[0xF3, 0xA5, 0xC3], 0);
    assert!(lifted.code.contains("while (cpu.cx != 0) { cpu.cx--;"));
    assert!(lifted.code.contains(
        "mem_write16(cpu, cpu.es, cpu.di, mem_read16(cpu, cpu.ds, cpu.si));"
    ));
    assert!(lifted
        .code
        .contains("cpu.si += df(cpu) ? -2 : 2; cpu.di += df(cpu) ? -2 : 2;"));
}

#[test]
fn repz_compare_appends_the_break_condition() {
    let lifted = lift_one("res_000000", &[0xF3, 0xA6, 0xC3], 0);
    assert!(lifted.code.contains("if (!zf(cpu)) break;"));

    let lifted = lift_one("res_000000", &[0xF2, 0xAE, 0xC3], 0);
    assert!(lifted.code.contains("if (zf(cpu)) break;"));
}

#[test]
fn conditional_and_unconditional_jumps_get_labels() {
    let mut code = vec![
        0x39, 0xD8, // cmp ax, bx
        0x74, 0x0C, // je 0x10
        0xEB, 0x1A, // jmp 0x20
    ];
    code.resize(0x21, 0x90);
    let lifted = lift_one("res_000000", &code, 0);
    assert!(lifted.code.contains("flags_cmp16(cpu, cpu.ax, cpu.bx);"));
    assert!(lifted.code.contains("if (cc_e(cpu)) goto L_0010;"));
    assert!(lifted.code.contains("goto L_0020;"));
    assert!(lifted.code.contains("L_0010:;"));
    assert!(lifted.code.contains("L_0020:;"));
}

#[test]
fn near_call_resolves_against_the_function_start() {
    let lifted = lift_one("res_004A00", &[0xE8, 0x1D, 0x00, 0xC3], 0x4A00);
    assert!(lifted.code.contains("res_004A20(cpu);"));
    assert!(lifted.calls.contains("res_004A20"));
}

#[test]
fn far_call_names_the_segment_pair() {
    let lifted =
        lift_one("res_000000", &[0x9A, 0x34, 0x12, 0x78, 0x56, 0xC3], 0);
    assert!(lifted.code.contains("far_5678_1234(cpu);"));
    assert!(lifted.calls.contains("far_5678_1234"));
}

#[test]
fn overlay_trap_lifts_to_a_static_call() {
    let lifted =
        lift_one("res_000000", &[0xCD, 0x3F, 0x07, 0x34, 0x12, 0xC3], 0);
    assert!(lifted.code.contains("ovl07_1234(cpu);"));
    assert!(lifted.code.contains("INT 3Fh -> OVL 07:1234"));
    assert!(lifted.overlay_calls.contains("ovl07_1234"));
}

#[test]
fn interrupts_route_to_service_stubs() {
    let lifted = lift_one(
        "res_000000",
        &[0xCD, 0x21, 0xCD, 0x10, 0xCD, 0x16, 0xCD, 0x33, 0xCD, 0x5C, 0xC3],
        0,
    );
    assert!(lifted.code.contains("dos_int21(cpu);"));
    assert!(lifted.code.contains("bios_int10(cpu);"));
    assert!(lifted.code.contains("bios_int16(cpu);"));
    assert!(lifted.code.contains("mouse_int33(cpu);"));
    assert!(lifted.code.contains("int_handler(cpu, 0x5C);"));
}

#[test]
fn inc_preserves_the_carry_flag() {
    let lifted = lift_one("res_000000", &[0x40, 0xC3], 0);
    assert!(lifted.code.contains("int _cf = cf(cpu);"));
    assert!(lifted.code.contains("flags_add16(cpu, cpu.ax, 1)"));
    assert!(lifted
        .code
        .contains("if (_cf) cpu.flags |= FLAG_CF; else cpu.flags &= ~FLAG_CF;"));
}

#[test]
fn ret_with_pop_amount_adjusts_the_stack() {
    let lifted = lift_one("res_000000", &[0xC2, 0x08, 0x00], 0);
    assert!(lifted.code.contains("cpu.sp += 0x8; return;"));
}

#[test]
fn unknown_mnemonics_survive_as_unhandled_comments() {
    let lifted = lift_one("res_000000", &[0xCE, 0xC3], 0);
    assert!(lifted.code.contains("/* UNHANDLED: into */"));
}

#[test]
fn lifted_function_snapshot() {
    let lifted = lift_one("res_000000", &[0x55, 0x8B, 0xEC, 0xC3], 0);
    insta::assert_snapshot!(lifted.code, @r#"
    void res_000000(CPU &cpu)
    {
        push16(cpu, cpu.bp);                     /* push bp */
        cpu.bp = (uint16_t)(cpu.sp);             /* mov bp, sp */
        return;                                  /* ret */
    }
    "#);
}
