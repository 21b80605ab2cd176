use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::Result;

use recomp16::analysis::{Analysis, Function};

/// Write the machine-readable function table: one entry per function with
/// its range, size and far flag, grouped by region.
pub fn export_symbols(analysis: &Analysis, path: &Path) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);

    writeln!(out, "# function symbols")?;
    writeln!(out, "# generated by recomp-tools analyze")?;
    writeln!(out)?;

    writeln!(out, "[resident]")?;
    let mut resident: Vec<_> = analysis.resident_functions().collect();
    resident.sort_by_key(|func| func.start);
    for func in resident {
        write_entry(&mut out, func)?;
    }

    for module in &analysis.overlays {
        writeln!(out, "\n[overlay_{:02}]", module.index)?;
        let mut functions: Vec<_> =
            analysis.overlay_functions(module.index).collect();
        functions.sort_by_key(|func| func.start);
        for func in functions {
            write_entry(&mut out, func)?;
        }
    }
    Ok(())
}

fn write_entry(out: &mut impl Write, func: &Function) -> Result<()> {
    writeln!(
        out,
        "{} = {{ start = 0x{:06X}, end = 0x{:06X}, size = {}, far = {} }}",
        func.name, func.start, func.end, func.size, func.is_far
    )?;
    Ok(())
}
