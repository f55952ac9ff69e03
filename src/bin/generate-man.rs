use clap::CommandFactory;
use clap_mangen::Man;
use leadboard::cli::Cli;
use std::path::PathBuf;

/// Write `leadboard.1` and one page per subcommand into the given directory (default `man/`)
fn main() -> std::io::Result<()> {
    let out_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("man"));
    std::fs::create_dir_all(&out_dir)?;

    let cmd = Cli::command();
    let mut buffer: Vec<u8> = Vec::new();
    Man::new(cmd.clone()).render(&mut buffer)?;
    std::fs::write(out_dir.join("leadboard.1"), buffer)?;

    for sub in cmd.get_subcommands() {
        let name = format!("leadboard-{}", sub.get_name());
        let mut buffer: Vec<u8> = Vec::new();
        Man::new(sub.clone()).render(&mut buffer)?;
        std::fs::write(out_dir.join(format!("{}.1", name)), buffer)?;
    }

    eprintln!("Man pages written to {}", out_dir.display());
    Ok(())
}
