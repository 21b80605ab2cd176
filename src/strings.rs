//! Printable-string extraction over the resident window and the heuristic
//! keyword categorization of functions.

use std::collections::BTreeMap;

use crate::analysis::Function;
use crate::ExeImage;

/// Shortest printable run worth recording.
pub const MIN_STRING_LEN: usize = 4;

/// Keyword table, checked in this order. The first keyword list that
/// matches a string decides the category tag.
pub const CATEGORIES: [(&str, &[&str]); 9] = [
    ("gfx", &[".pic", ".pal", "graphic", "sprite", "icon", "VGA", "EGA"]),
    ("sound", &[".cvl", "sound", "AdLib", "Blaster", "Tandy"]),
    ("input", &["Mouse", "Keyboard", "mouse", "keyboard"]),
    (
        "game",
        &[
            "city",
            "unit",
            "build",
            "combat",
            "wonder",
            "advance",
            "Civilization",
            "civilization",
            "GAME OVER",
        ],
    ),
    ("map", &["Map", "map", "terrain", "continent", "ocean"]),
    (
        "diplo",
        &["king", "President", "Warlord", "Emperor", "treaty", "peace", "war"],
    ),
    ("save", &["Save", "Load", "CIVIL0", "civil0", "fame"]),
    ("ui", &["menu", "Menu", "Status", "screen", "display"]),
    ("init", &["Start", "New Game", "logo", "credits", "intro"]),
];

/// Collect every maximal run of printable bytes (0x20..=0x7E) of length at
/// least [`MIN_STRING_LEN`] in the resident window, keyed by starting file
/// offset.
pub fn extract(image: &ExeImage) -> BTreeMap<usize, String> {
    let mut table = BTreeMap::new();
    let mut run: Vec<u8> = Vec::new();
    let mut run_start = 0;

    for offset in image.resident_range() {
        let byte = image.data()[offset];
        if (0x20..0x7F).contains(&byte) {
            if run.is_empty() {
                run_start = offset;
            }
            run.push(byte);
        } else {
            flush(&mut table, run_start, &mut run);
        }
    }
    // a run still open at the window end is maximal too
    flush(&mut table, run_start, &mut run);
    table
}

fn flush(table: &mut BTreeMap<usize, String>, start: usize, run: &mut Vec<u8>) {
    if run.len() >= MIN_STRING_LEN {
        table.insert(start, String::from_utf8_lossy(run).into_owned());
    }
    run.clear();
}

/// Category for one string, if any keyword list matches it.
pub fn category_of(text: &str) -> Option<&'static str> {
    CATEGORIES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| text.contains(kw)))
        .map(|(tag, _)| *tag)
}

/// Tag each function with the category of the first matching string whose
/// offset falls inside the function's half-open range. Strings are visited
/// in ascending offset order; functions with no matching string keep no
/// tag.
pub fn categorize(
    functions: &mut [Function],
    strings: &BTreeMap<usize, String>,
) {
    for func in functions.iter_mut() {
        func.category = strings
            .range(func.start..func.end)
            .find_map(|(_, text)| category_of(text));
    }
}
