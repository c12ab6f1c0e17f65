use std::path::Path;

use color_print::{cformat, cprintln};
use indexmap::IndexMap;
use masm::testbench::load_cases;
use masm::{parse_into, util, Error, Program};
use tracing::Level;

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
    #[clap(short, long, default_value = "main.hex")]
    output: String,

    /// Dump assembly code
    #[clap(short, long)]
    dump: bool,

    /// Log link and encode passes
    #[clap(short, long)]
    verbose: bool,

    /// Generate testbench scripts from a YAML test file
    #[clap(short, long)]
    tests: Option<String>,

    /// Directory for the generated testbench scripts
    #[clap(long, default_value = ".")]
    test_dir: String,
}

/// An error and the input file it belongs to, if any.
struct Failure(Option<String>, Error);

impl From<Error> for Failure {
    fn from(error: Error) -> Self {
        Failure(None, error)
    }
}

fn main() {
    use clap::Parser;

    let args: Args = Args::parse();
    if args.verbose {
        tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .with_target(false)
            .init();
    }
    println!("Assembler for the 16-bit teaching CPU");

    let mut files = IndexMap::new();
    if let Err(Failure(file, error)) = run(&args, &mut files) {
        error.print_diag(&files, file.as_deref());
        std::process::exit(1);
    }
}

fn run(args: &Args, files: &mut IndexMap<String, Vec<String>>) -> Result<(), Failure> {
    println!("1. Read Files and Parse Lines");
    let mut program = Program::new();
    for path in &args.input {
        println!("  < {}", path);
        let src = std::fs::read_to_string(path)
            .map_err(|e| Error::FileOpen(path.clone(), e))?;
        files.insert(path.clone(), src.lines().map(str::to_string).collect());
        parse_into(&mut program, &src).map_err(|e| Failure(Some(path.clone()), e))?;
    }

    println!("2. Link");
    program.link()?;
    cprintln!(
        "  <g>{}</> instructions, <g>{}</> words, <g>{}</> labels",
        program.len(),
        program.size(),
        program.symbols().count()
    );

    println!("3. Generate Hex");
    println!("  > {}", &args.output);
    program.write_hex_file(&args.output)?;

    if args.dump {
        util::print_dump(&mut program)?;
    }

    if let Some(tests) = &args.tests {
        println!("4. Generate Testbenches");
        let file = std::fs::File::open(tests).map_err(|e| Error::FileOpen(tests.clone(), e))?;
        for case in load_cases(file).map_err(|e| Failure(Some(tests.clone()), e))? {
            // lines of a build error count from the case source, not the YAML file
            let test = case.build().map_err(|e| {
                cprintln!("<r,s>test `{}` failed</>", case.label);
                Failure(Some(tests.clone()), e.into_kind())
            })?;
            let path = Path::new(&args.test_dir).join(format!("{}.txt", test.label()));
            std::fs::write(&path, test.script()).map_err(Error::FileWrite)?;
            println!("{}", cformat!("  > <u>{}</>", path.display()));
        }
    }
    Ok(())
}
