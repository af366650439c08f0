use asm86::{
    error::{print_note, print_warn, Error},
    util::print_dump,
    Assembler, DiagKind, Output,
};
use color_print::cprintln;
use indexmap::IndexMap;
use std::process::ExitCode;

const HELP_TEMPLATE: &str = "\
{before-help}{bin} {version}
  {author}
  {about}

{usage-heading}
{tab}{usage}

{all-args}{after-help}";

#[derive(Debug, clap::Parser)]
#[clap(author, version, about, help_template = HELP_TEMPLATE)]
struct Args {
    /// Input files
    #[clap(default_value = "main.asm")]
    input: Vec<String>,

    /// Output file
    #[clap(short, long, default_value = "main.bin")]
    output: String,

    /// Dump assembly listing
    #[clap(short, long)]
    dump: bool,

    /// Write labels and symbols as YAML
    #[clap(short, long)]
    map: Option<String>,
}

fn main() -> ExitCode {
    use clap::Parser;

    let args = Args::parse();
    println!("x86-16 Assembler");

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            cprintln!("<r,s>{}</>", err);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether assembly finished without errors.
fn run(args: &Args) -> Result<bool, Error> {
    use std::io::{BufRead, Write};

    println!("1. Read Files");
    let mut files: IndexMap<String, Vec<String>> = IndexMap::new();
    for path in &args.input {
        println!("  < {}", path);
        let file = std::fs::File::open(path).map_err(|e| Error::FileOpen(path.clone(), e))?;
        let lines = std::io::BufReader::new(file)
            .lines()
            .collect::<Result<Vec<_>, _>>()
            .map_err(Error::FileRead)?;
        files.insert(path.clone(), lines);
    }

    println!("2. Assemble Lines");
    let mut asm = Assembler::new();
    let mut outputs: Vec<(String, Output)> = vec![];
    let mut clean = true;
    for (path, lines) in &files {
        let output = asm.assemble(path, lines);
        for diag in &output.diagnostics {
            match &diag.kind {
                DiagKind::Error(err) => {
                    clean = false;
                    err.print_diag(&files, &diag.source, diag.line);
                }
                DiagKind::Warning(warning) => {
                    print_warn(&warning.to_string(), &files, &diag.source, diag.line);
                    print_note(warning.note());
                }
            }
        }
        let aborted = output.aborted;
        outputs.push((path.clone(), output));
        if aborted {
            cprintln!("<r,s>Aborted</>: fatal error in {}", path);
            break;
        }
    }

    println!("3. Generate Binary");
    println!("  > {}", &args.output);
    let bytes: Vec<u8> = outputs.iter().flat_map(|(_, out)| out.bytes()).collect();
    let mut file =
        std::fs::File::create(&args.output).map_err(|e| Error::FileCreate(args.output.clone(), e))?;
    file.write_all(&bytes)
        .map_err(|e| Error::FileWrite(args.output.clone(), e))?;

    if let Some(map) = &args.map {
        println!("  > {}", map);
        let yaml = serde_yaml::to_string(&asm.state).map_err(Error::MapSerialize)?;
        std::fs::write(map, yaml).map_err(|e| Error::FileWrite(map.clone(), e))?;
    }

    if args.dump {
        print_dump(&files, &outputs);
    }

    Ok(clean)
}
