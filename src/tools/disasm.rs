use crate::{load_image, Args, DisasmArgs};

use anyhow::{anyhow, Result};

use recomp16::decode::Decoder;

pub fn disasm(args: &Args, disasm_args: &DisasmArgs) -> Result<()> {
    let image = load_image(args)?;

    let (start, length) = if disasm_args.resident {
        let range = image.resident_range();
        println!(
            "; Resident code: offset 0x{:X}, {} bytes",
            range.start,
            range.len()
        );
        (range.start, range.len())
    } else if let Some(index) = disasm_args.overlay {
        let overlays = image.find_overlays();
        let module = overlays
            .iter()
            .find(|module| module.index == index)
            .ok_or_else(|| anyhow!("overlay {index} not found"))?;
        println!(
            "; Overlay {}: file offset 0x{:X}, code at 0x{:X}, {} bytes",
            module.index, module.file_offset, module.code_offset, module.code_size
        );
        (module.code_offset, module.code_size)
    } else {
        let start = disasm_args.start.unwrap_or(0).min(image.data().len());
        let length = disasm_args
            .length
            .unwrap_or_else(|| image.data().len() - start);
        (start, length)
    };

    let end = (start + length).min(image.data().len());
    let mut decoder = Decoder::new(&image.data()[start..end], start);
    let instructions = decoder.decode_all();

    for ins in &instructions {
        let hex = ins
            .raw
            .iter()
            .take(8)
            .map(|byte| format!("{byte:02X}"))
            .collect::<Vec<_>>()
            .join(" ");
        let overlay = ins
            .overlay
            .map(|target| {
                format!("  ; OVL {:02X}:{:04X}", target.module, target.entry)
            })
            .unwrap_or_default();
        println!("{:06X}  {hex:<24} {ins}{overlay}", ins.offset);
    }

    println!("\n; {} instructions decoded", instructions.len());
    Ok(())
}
