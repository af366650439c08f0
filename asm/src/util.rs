use crate::assembler::{DiagKind, Output};
use color_print::cformat;
use indexmap::IndexMap;

const BYTES_PER_ROW: usize = 6;
const LEFT: usize = 7 + 3 * BYTES_PER_ROW;

/// Print a listing: address, emitted bytes and source for every line.
pub fn print_dump(files: &IndexMap<String, Vec<String>>, outputs: &[(String, Output)]) {
    for (path, output) in outputs {
        let Some(lines) = files.get(path) else {
            continue;
        };
        let records: IndexMap<usize, _> = output.records.iter().map(|r| (r.line, r)).collect();

        println!(
            "{}+------[{}]{}",
            "-".repeat(LEFT),
            path,
            "-".repeat(45usize.saturating_sub(path.len()))
        );

        for (idx, source) in lines.iter().enumerate() {
            let line_num = idx + 1;
            let failed = output.diagnostics.iter().any(|d| {
                d.line == idx && matches!(d.kind, DiagKind::Error(_))
            });

            let Some(record) = records.get(&idx).filter(|r| !r.emits.is_empty()) else {
                let mark = match failed {
                    true => cformat!("<r,s>{}</>", format!("{:<width$}", "!!", width = LEFT)),
                    false => " ".repeat(LEFT),
                };
                println!("{}| {:>4}: {}", mark, line_num, source);
                continue;
            };

            for (row, chunk) in record.emits.chunks(BYTES_PER_ROW).enumerate() {
                let addr = format!("[{:04X}]", chunk[0].address);
                let bytes: String = chunk.iter().map(|e| e.cformat() + " ").collect();
                let pad = " ".repeat(3 * (BYTES_PER_ROW - chunk.len()));
                match row {
                    0 => println!("{} {}{}| {:>4}: {}", addr, bytes, pad, line_num, source),
                    _ => println!("{} {}{}|", addr, bytes, pad),
                }
            }
        }
    }
    println!("{}+{}", "-".repeat(LEFT), "-".repeat(53));
}
