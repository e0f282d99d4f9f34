use clap::{ArgAction, Parser};
use fgi::index::build::{delete_tree, index_tree};
use fgi::index::types::Config;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "fgi",
    version,
    about = "Index directory trees to accelerate regex search",
    disable_help_flag = true
)]
struct Cli {
    /// Pathname to the root of the directory tree to index
    #[arg(value_name = "PATH")]
    path: Option<PathBuf>,

    /// Indexing accuracy: low accuracy reduces storage overhead at the cost
    /// of more false positive matches; 3 to 7 recommended
    #[arg(long, value_name = "DIGIT", value_parser = clap::value_parser!(u8).range(0..=9))]
    accuracy: Option<u8>,

    // -0 .. -9 are shorthand for --accuracy=DIGIT
    #[arg(short = '0', hide = true, action = ArgAction::SetTrue)]
    accuracy_0: bool,
    #[arg(short = '1', hide = true, action = ArgAction::SetTrue)]
    accuracy_1: bool,
    #[arg(short = '2', hide = true, action = ArgAction::SetTrue)]
    accuracy_2: bool,
    #[arg(short = '3', hide = true, action = ArgAction::SetTrue)]
    accuracy_3: bool,
    #[arg(short = '4', hide = true, action = ArgAction::SetTrue)]
    accuracy_4: bool,
    #[arg(short = '5', hide = true, action = ArgAction::SetTrue)]
    accuracy_5: bool,
    #[arg(short = '6', hide = true, action = ArgAction::SetTrue)]
    accuracy_6: bool,
    #[arg(short = '7', hide = true, action = ArgAction::SetTrue)]
    accuracy_7: bool,
    #[arg(short = '8', hide = true, action = ArgAction::SetTrue)]
    accuracy_8: bool,
    #[arg(short = '9', hide = true, action = ArgAction::SetTrue)]
    accuracy_9: bool,

    /// Recursively check and report indexes without reindexing files
    #[arg(short = 'c', long)]
    check: bool,

    /// Recursively remove index files
    #[arg(short = 'd', long)]
    delete: bool,

    /// Force reindexing of files, even those that are already indexed
    #[arg(short = 'f', long)]
    force: bool,

    /// Index hidden files and directories
    #[arg(short = '.', long)]
    hidden: bool,

    /// Do not index binary files
    #[arg(short = 'I', long = "ignore-binary")]
    ignore_binary: bool,

    /// Follow symbolic links to files; links to directories are never
    /// followed
    #[arg(short = 'S', long = "dereference-files")]
    dereference_files: bool,

    /// Index the contents of compressed files and archives
    #[arg(short = 'z', long)]
    decompress: bool,

    /// Bound on nested decompression stages applied with --decompress
    #[arg(long, value_name = "NUM", default_value_t = 1,
          value_parser = clap::value_parser!(u32).range(1..=99))]
    zmax: u32,

    /// Do not index files and directories matching the globs in FILE
    /// encountered during indexing
    #[arg(short = 'X', long = "ignore-files", value_name = "FILE",
          num_args = 0..=1, require_equals = true,
          default_missing_value = ".gitignore", action = ArgAction::Append)]
    ignore_files: Vec<String>,

    /// Quiet mode: do not display indexing statistics
    #[arg(short = 'q', long, visible_alias = "silent")]
    quiet: bool,

    /// Silent mode: suppress error messages and warnings
    #[arg(short = 's', long = "no-messages")]
    no_messages: bool,

    /// Produce verbose output
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Display a help message and exit
    #[arg(short = '?', short_alias = 'h', long = "help", action = ArgAction::Help)]
    help: Option<bool>,
}

impl Cli {
    fn into_config(self) -> Config {
        let mut accuracy = self.accuracy.unwrap_or(5);
        let digits = [
            self.accuracy_0,
            self.accuracy_1,
            self.accuracy_2,
            self.accuracy_3,
            self.accuracy_4,
            self.accuracy_5,
            self.accuracy_6,
            self.accuracy_7,
            self.accuracy_8,
            self.accuracy_9,
        ];
        for (digit, set) in digits.iter().enumerate() {
            if *set {
                accuracy = digit as u8;
            }
        }

        // mode precedence: check > delete > force
        let check = self.check;
        let delete = self.delete && !check;
        let force = self.force && !check && !delete;

        Config {
            accuracy,
            check,
            delete,
            force,
            hidden: self.hidden,
            ignore_binary: self.ignore_binary,
            dereference_files: self.dereference_files,
            decompress: self.decompress,
            zmax: self.zmax,
            quiet: self.quiet,
            no_messages: self.no_messages || self.quiet,
            verbose: self.verbose,
            ignore_files: self.ignore_files,
            path: self.path.unwrap_or_else(|| PathBuf::from(".")),
        }
    }
}

fn main() -> ExitCode {
    // broken pipes must surface as I/O errors, not kill the process
    #[cfg(unix)]
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_IGN);
    }

    let config = Cli::parse().into_config();

    let result = if config.delete {
        delete_tree(&config, &config.path).map(|_| 0u8)
    } else {
        index_tree(&config, &config.path).map(|stats| {
            stats.report(&config);
            u8::from(config.check && !stats.is_fresh())
        })
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("fgi: error: {:#}", e);
            ExitCode::from(2)
        }
    }
}
