use std::collections::BTreeMap;

use recomp16::analysis::Analysis;

/// Print the human-readable analysis summary: totals, per-overlay and
/// per-category breakdowns, the largest and most-called functions, and the
/// overlay call histogram. `verbose` appends the full function listing.
pub fn print_report(analysis: &Analysis, verbose: bool) {
    println!();
    println!("{}", "=".repeat(70));
    println!("  Overlay executable - function analysis");
    println!("{}", "=".repeat(70));

    let resident = analysis.resident_functions().count();
    let overlay = analysis.functions.len() - resident;
    println!();
    println!("  Total functions detected:  {}", analysis.functions.len());
    println!("  Resident functions:        {resident}");
    println!("  Overlay functions:         {overlay}");
    println!("  Total instructions:        {}", analysis.total_instructions());
    println!("  Strings extracted:         {}", analysis.strings.len());

    println!("\n  === Overlay Module Functions ===");
    for module in &analysis.overlays {
        println!(
            "  OVL {:2}: {:3} functions, {:6} bytes",
            module.index,
            analysis.overlay_functions(module.index).count(),
            module.code_size
        );
    }

    let mut categories: BTreeMap<&str, usize> = BTreeMap::new();
    for func in &analysis.functions {
        *categories.entry(func.category.unwrap_or("unknown")).or_default() += 1;
    }
    if !categories.is_empty() {
        let mut categories: Vec<_> = categories.into_iter().collect();
        categories.sort_by_key(|(_, count)| std::cmp::Reverse(*count));
        println!("\n  === Function Categories ===");
        for (category, count) in categories {
            println!("    {category:<12}: {count:4} functions");
        }
    }

    let mut by_size: Vec<_> = analysis.functions.iter().collect();
    by_size.sort_by_key(|func| std::cmp::Reverse(func.size));
    println!("\n  === Largest Functions (top 20) ===");
    println!(
        "  {:<22} {:>8} {:>8} {:>6} {:>6} {:>4} {:>8}",
        "Name", "Start", "Size", "Insts", "Stack", "Far", "Cat"
    );
    println!(
        "  {} {} {} {} {} {} {}",
        "-".repeat(22),
        "-".repeat(8),
        "-".repeat(8),
        "-".repeat(6),
        "-".repeat(6),
        "-".repeat(4),
        "-".repeat(8)
    );
    for func in by_size.iter().take(20) {
        println!(
            "  {:<22} {:08X} {:7}B {:5} {:5}B {:>4} {:>8}",
            func.name,
            func.start,
            func.size,
            func.inst_count,
            func.local_size,
            if func.is_far { "Y" } else { "N" },
            func.category.unwrap_or("-")
        );
    }

    let mut by_callers: Vec<_> = analysis.functions.iter().collect();
    by_callers.sort_by_key(|func| std::cmp::Reverse(func.called_by.len()));
    println!("\n  === Most-Called Functions (top 20) ===");
    println!(
        "  {:<22} {:>8} {:>8} {:>8}",
        "Name", "Callers", "Size", "Cat"
    );
    println!(
        "  {} {} {} {}",
        "-".repeat(22),
        "-".repeat(8),
        "-".repeat(8),
        "-".repeat(8)
    );
    for func in by_callers.iter().take(20) {
        if func.called_by.is_empty() {
            break;
        }
        println!(
            "  {:<22} {:7}  {:7}B {:>8}",
            func.name,
            func.called_by.len(),
            func.size,
            func.category.unwrap_or("-")
        );
    }

    let call_sites: usize =
        analysis.functions.iter().map(|f| f.overlay_calls.len()).sum();
    if call_sites > 0 {
        println!("\n  === Overlay Call Summary ===");
        println!("  Total overlay call sites: {call_sites}");
        let mut per_module: BTreeMap<u8, usize> = BTreeMap::new();
        for func in &analysis.functions {
            for (module, _) in &func.overlay_calls {
                *per_module.entry(*module).or_default() += 1;
            }
        }
        for (module, count) in per_module {
            println!("    OVL {module:02X}: {count:3} calls");
        }
    }

    if verbose {
        println!("\n  === All Functions ===");
        let mut by_start: Vec<_> = analysis.functions.iter().collect();
        by_start.sort_by_key(|func| func.start);
        for func in by_start {
            let overlay_tag = if func.is_overlay() {
                format!(" (OVL {})", func.overlay)
            } else {
                String::new()
            };
            println!(
                "  {:<22} {:08X}-{:08X} {:6}B {:5} insts{overlay_tag}",
                func.name, func.start, func.end, func.size, func.inst_count
            );
        }
    }
}
