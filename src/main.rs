use std::path::PathBuf;

use apod_tui::app::RunOptions;

const HELP: &str = "APOD-TUI - Browse the Astronomy Picture of the Day gallery from the terminal.

  --version, -V        Show version and exit
  --help,    -h        Show this help message
  --feed <url>         Load records from this feed URL
  --offline            Use the built-in sample records
  --config <path>      Read config from this file";

enum Cli {
    Exit,
    Run(RunOptions),
}

fn main() {
    let opts = match parse_args(std::env::args().skip(1)) {
        Ok(Cli::Exit) => return,
        Ok(Cli::Run(opts)) => opts,
        Err(err) => {
            eprintln!("error: {err}\n\n{HELP}");
            std::process::exit(2);
        }
    };

    if let Err(err) = apod_tui::run(opts) {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Cli, String> {
    let mut opts = RunOptions::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("APOD-TUI {}", apod_tui::VERSION);
                return Ok(Cli::Exit);
            }
            "--help" | "-h" => {
                println!("{HELP}");
                return Ok(Cli::Exit);
            }
            "--feed" => {
                let url = args.next().ok_or("--feed requires a URL")?;
                opts.feed_url = Some(url);
            }
            "--config" => {
                let path = args.next().ok_or("--config requires a path")?;
                opts.config_file = Some(PathBuf::from(path));
            }
            "--offline" => opts.offline = true,
            other => return Err(format!("unknown argument: {other}")),
        }
    }
    Ok(Cli::Run(opts))
}
