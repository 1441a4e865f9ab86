//! Man pages for rdyspi
//!
//! Writes `rdyspi.1` plus one `rdyspi-<command>.1` per subcommand, so the
//! device options shared by `show`, `transfer` and `send` are documented
//! where they are used.

use clap::{CommandFactory, Parser};
use std::fs;
use std::path::{Path, PathBuf};

#[allow(dead_code)]
#[path = "../cli.rs"]
mod cli;

#[derive(Parser)]
#[command(name = "gen-manpage", about = "Render the rdyspi man pages")]
struct Args {
    /// Directory to write the pages to
    #[arg(default_value = "man")]
    out_dir: PathBuf,

    /// Skip the per-command pages
    #[arg(long)]
    main_only: bool,
}

fn render(man: clap_mangen::Man, path: &Path) -> std::io::Result<()> {
    let mut buffer = Vec::new();
    man.render(&mut buffer)?;
    fs::write(path, buffer)?;
    println!("  {}", path.display());
    Ok(())
}

fn main() -> std::io::Result<()> {
    let args = Args::parse();
    fs::create_dir_all(&args.out_dir)?;

    let cmd = cli::Cli::command();
    println!("Writing man pages:");
    render(clap_mangen::Man::new(cmd.clone()), &args.out_dir.join("rdyspi.1"))?;

    if !args.main_only {
        for sub in cmd.get_subcommands().filter(|s| !s.is_hide_set()) {
            let page = format!("rdyspi-{}", sub.get_name());
            let man = clap_mangen::Man::new(sub.clone()).title(page.clone());
            render(man, &args.out_dir.join(format!("{}.1", page)))?;
        }
    }

    println!("\nView with: man -l {}", args.out_dir.join("rdyspi.1").display());
    Ok(())
}
