//! Shared helpers: fabricated executable images with an embedded table.

use std::io::Write;

use modstamp::{INFO_END, INFO_START};
use tempfile::NamedTempFile;

/// A read-only region: padding, the bracketed table, more padding.
pub fn stamped_region(table: &[u8]) -> Vec<u8> {
    let mut region = vec![0u8; 64];
    region.extend_from_slice(&INFO_START);
    region.extend_from_slice(table);
    region.extend_from_slice(&INFO_END);
    region.resize(region.len() + 64, 0);
    region
}

/// Minimal ELF64 little-endian executable whose read-only LOAD segment
/// holds `ro_data`.
pub fn build_elf64(ro_vaddr: u64, ro_data: &[u8]) -> Vec<u8> {
    const PT_LOAD: u32 = 1;
    const PF_X: u32 = 1;
    const PF_R: u32 = 4;
    let ro_off = 0x400u64;

    let mut img = Vec::new();
    img.extend_from_slice(b"\x7fELF");
    img.extend_from_slice(&[2, 1, 1, 0]);
    img.extend_from_slice(&[0u8; 8]);
    img.extend_from_slice(&2u16.to_le_bytes()); // e_type
    img.extend_from_slice(&62u16.to_le_bytes()); // e_machine
    img.extend_from_slice(&1u32.to_le_bytes()); // e_version
    img.extend_from_slice(&0x401000u64.to_le_bytes()); // e_entry
    img.extend_from_slice(&64u64.to_le_bytes()); // e_phoff
    img.extend_from_slice(&0u64.to_le_bytes()); // e_shoff
    img.extend_from_slice(&0u32.to_le_bytes()); // e_flags
    img.extend_from_slice(&64u16.to_le_bytes()); // e_ehsize
    img.extend_from_slice(&56u16.to_le_bytes()); // e_phentsize
    img.extend_from_slice(&2u16.to_le_bytes()); // e_phnum
    img.extend_from_slice(&[0u8; 6]); // section header fields

    let phdr = |p_type: u32, p_flags: u32, off: u64, vaddr: u64, filesz: u64| {
        let mut e = Vec::new();
        e.extend_from_slice(&p_type.to_le_bytes());
        e.extend_from_slice(&p_flags.to_le_bytes());
        e.extend_from_slice(&off.to_le_bytes());
        e.extend_from_slice(&vaddr.to_le_bytes());
        e.extend_from_slice(&vaddr.to_le_bytes());
        e.extend_from_slice(&filesz.to_le_bytes());
        e.extend_from_slice(&filesz.to_le_bytes());
        e.extend_from_slice(&0x1000u64.to_le_bytes());
        e
    };
    img.extend_from_slice(&phdr(PT_LOAD, PF_R | PF_X, 0x200, 0x401000, 0x100));
    img.extend_from_slice(&phdr(PT_LOAD, PF_R, ro_off, ro_vaddr, ro_data.len() as u64));

    img.resize(ro_off as usize, 0);
    img.extend_from_slice(ro_data);
    img
}

/// Minimal PE32+ executable whose first section holds `ro_data`.
pub fn build_pe(image_base: u64, section_rva: u32, ro_data: &[u8]) -> Vec<u8> {
    let e_lfanew = 0x80u32;
    let opt_size = 112u16;
    let raw_off = 0x400u32;

    let mut img = Vec::new();
    img.extend_from_slice(b"MZ");
    img.resize(60, 0);
    img.extend_from_slice(&e_lfanew.to_le_bytes());
    img.resize(e_lfanew as usize, 0);

    img.extend_from_slice(b"PE\0\0");
    img.extend_from_slice(&0x8664u16.to_le_bytes());
    img.extend_from_slice(&1u16.to_le_bytes()); // one section
    img.extend_from_slice(&[0u8; 12]);
    img.extend_from_slice(&opt_size.to_le_bytes());
    img.extend_from_slice(&0x22u16.to_le_bytes());

    let opt_start = img.len();
    img.extend_from_slice(&0x20bu16.to_le_bytes()); // PE32+
    img.resize(opt_start + 24, 0);
    img.extend_from_slice(&image_base.to_le_bytes());
    img.resize(opt_start + opt_size as usize, 0);

    img.extend_from_slice(b".rdata\0\0");
    img.extend_from_slice(&(ro_data.len() as u32).to_le_bytes());
    img.extend_from_slice(&section_rva.to_le_bytes());
    img.extend_from_slice(&(ro_data.len() as u32).to_le_bytes());
    img.extend_from_slice(&raw_off.to_le_bytes());
    img.extend_from_slice(&[0u8; 16]);

    img.resize(raw_off as usize, 0);
    img.extend_from_slice(ro_data);
    img
}

/// Minimal 64-bit little-endian Mach-O whose `__TEXT` segment holds
/// `ro_data`, preceded by a `__PAGEZERO` segment.
pub fn build_macho64(text_vmaddr: u64, ro_data: &[u8]) -> Vec<u8> {
    const LC_SEGMENT_64: u32 = 0x19;
    let file_off = 0x200u64;

    let seg64 = |name: &[u8], vmaddr: u64, fileoff: u64, filesize: u64| {
        let mut c = Vec::new();
        c.extend_from_slice(&LC_SEGMENT_64.to_le_bytes());
        c.extend_from_slice(&72u32.to_le_bytes());
        let mut segname = [0u8; 16];
        segname[..name.len()].copy_from_slice(name);
        c.extend_from_slice(&segname);
        c.extend_from_slice(&vmaddr.to_le_bytes());
        c.extend_from_slice(&filesize.to_le_bytes());
        c.extend_from_slice(&fileoff.to_le_bytes());
        c.extend_from_slice(&filesize.to_le_bytes());
        c.extend_from_slice(&[0u8; 16]);
        c
    };
    let mut cmds = Vec::new();
    cmds.extend_from_slice(&seg64(b"__PAGEZERO", 0, 0, 0x1000));
    cmds.extend_from_slice(&seg64(b"__TEXT", text_vmaddr, file_off, ro_data.len() as u64));

    let mut img = Vec::new();
    img.extend_from_slice(&0xfeed_facfu32.to_le_bytes());
    img.extend_from_slice(&0x0100_0007u32.to_le_bytes());
    img.extend_from_slice(&3u32.to_le_bytes());
    img.extend_from_slice(&2u32.to_le_bytes());
    img.extend_from_slice(&2u32.to_le_bytes());
    img.extend_from_slice(&(cmds.len() as u32).to_le_bytes());
    img.extend_from_slice(&0u32.to_le_bytes());
    img.extend_from_slice(&0u32.to_le_bytes());
    img.extend_from_slice(&cmds);

    img.resize(file_off as usize, 0);
    img.extend_from_slice(ro_data);
    img
}

/// Write an image to a named temporary file.
pub fn write_image(img: &[u8]) -> NamedTempFile {
    let mut tmp = NamedTempFile::new().expect("create temp file");
    tmp.write_all(img).expect("write image");
    tmp.flush().expect("flush image");
    tmp
}
