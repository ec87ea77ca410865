use dexcheck::dex::{Code, CodeFormatError, Method, WidthTable};
use dexcheck::verifier::{self, get_branch_target, InsnFlags, Settings};

use clap::{crate_version, value_parser, Arg, ArgAction, Command};
use std::fmt;
use std::fs;
use std::io;
use std::process;

#[derive(Debug)]
enum Error {
    Io(io::Error),
    Format(CodeFormatError),
    Rejected(verifier::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "failed to read input: {}", err),
            Error::Format(err) => write!(f, "malformed code item: {}", err),
            Error::Rejected(err) => write!(f, "method rejected: {}", err),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<CodeFormatError> for Error {
    fn from(err: CodeFormatError) -> Error {
        Error::Format(err)
    }
}

impl From<verifier::Error> for Error {
    fn from(err: verifier::Error) -> Error {
        Error::Rejected(err)
    }
}

fn main() {
    env_logger::init();

    if let Err(err) = run() {
        eprintln!("{}", err);
        process::exit(1);
    }
}

fn run() -> Result<(), Error> {
    let matches = Command::new("dexcheck")
        .version(crate_version!())
        .author("Alec Theriault <alec.theriault@gmail.com>")
        .about("Structurally pre-verify the code of one method")
        .arg(
            Arg::new("class")
                .long("class")
                .value_name("DESCRIPTOR")
                .default_value("LUnknown;")
                .help("Descriptor of the declaring class (eg. `Lfoo/Bar;`)"),
        )
        .arg(
            Arg::new("method")
                .long("method")
                .value_name("NAME")
                .default_value("unknown")
                .help("Name of the method"),
        )
        .arg(
            Arg::new("proto")
                .long("proto")
                .value_name("DESCRIPTOR")
                .default_value("()V")
                .help("Prototype descriptor of the method (eg. `(II)V`)"),
        )
        .arg(
            Arg::new("lenient")
                .long("lenient")
                .action(ArgAction::SetTrue)
                .help("Don't log rejections (they still fail)"),
        )
        .arg(
            Arg::new("max-width")
                .long("max-width")
                .value_name("CODE_UNITS")
                .value_parser(value_parser!(usize))
                .help("Reject instructions wider than this"),
        )
        .arg(
            Arg::new("INPUT")
                .help("Code item to verify")
                .required(true)
                .index(1),
        )
        .get_matches();

    let mut settings = if matches.get_flag("lenient") {
        Settings::lenient()
    } else {
        Settings::strict()
    };
    if let Some(max_width) = matches.get_one::<usize>("max-width") {
        settings.max_insn_width = *max_width;
    }

    let input = matches
        .get_one::<String>("INPUT")
        .expect("INPUT is required");
    log::info!("Reading code item '{}'", input);
    let bytes = fs::read(input)?;
    let code = Code::parse(&bytes)?;

    let arg = |name: &str| matches.get_one::<String>(name).cloned().unwrap_or_default();
    let method = Method::new(arg("class"), arg("method"), arg("proto"), code);

    let annotations = verifier::pre_verify(&method, &WidthTable::standard(), &settings)?;
    for (addr, flags) in annotations.insn_flags.opcodes() {
        let mut line = format!("{:04x}: width={}", addr, flags.width());
        if flags.contains(InsnFlags::IN_TRY) {
            line.push_str(" try");
        }
        if flags.contains(InsnFlags::BRANCH_TARGET) {
            line.push_str(" target");
        }
        if let Some(branch) = get_branch_target(&method.code, addr) {
            let kind = if branch.conditional { "if" } else { "goto" };
            line.push_str(&format!(" {} {:+}", kind, branch.offset));
        }
        println!("{}", line);
    }
    println!("new-instance: {}", annotations.new_instance_count);

    Ok(())
}
