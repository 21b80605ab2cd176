use std::fs::File;
use std::io::{BufWriter, Write};

use anyhow::Result;

use recomp16::analysis::Analysis;
use recomp16::decode::Decoder;
use recomp16::lift::Lifter;

use crate::{load_image, Args, LiftArgs};

/// Lift every detected function and write the generated source, one
/// routine per function, resident code first and overlays in module order.
pub fn translate(args: &Args, lift_args: &LiftArgs) -> Result<()> {
    let image = load_image(args)?;
    let analysis = Analysis::run(&image);

    let mut out: Box<dyn Write> = match &lift_args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(std::io::stdout().lock()),
    };

    writeln!(out, "/* generated by recomp-tools lift */")?;
    writeln!(out, "#include \"cpu.h\"")?;

    let mut lifter = Lifter::new();
    for func in &analysis.functions {
        let end = func.end.min(image.data().len());
        let mut decoder =
            Decoder::new(&image.data()[func.start..end], func.start);
        let instructions = decoder.decode_all();
        let lifted = lifter.lift_function(&func.name, &instructions, func.start);
        writeln!(out)?;
        writeln!(out, "{}", lifted.code)?;
    }
    Ok(())
}
