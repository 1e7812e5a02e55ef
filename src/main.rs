use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

use novelreader::cli::{AccountCommand, Cli, Command, TranslateCommand};
use novelreader::commands;

fn main() -> ExitCode {
    if let Err(err) = try_main() {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn try_main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    novelreader::logging::init(cli.command.log_file().as_deref()).context("init logging")?;
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        Command::Read(args) => {
            let summary = commands::read(args).context("read")?;
            println!("{}", summary.message());
            for failure in &summary.failures {
                println!("{failure}");
            }
            if let Some(halted) = &summary.halted {
                println!("stopped early: {halted}");
            }
        }
        Command::Reprocess(args) => {
            let summary = commands::reprocess(args).context("reprocess")?;
            println!("{}", summary.message());
            for failure in &summary.failures {
                println!("{failure}");
            }
        }
        Command::Pdf(args) => {
            let summary = commands::pdf(args).context("pdf")?;
            println!(
                "converted: {}, failed: {}",
                summary.converted, summary.failed
            );
        }
        Command::Translate {
            command: TranslateCommand::Words(args),
        } => {
            let summary = commands::translate_words(args).context("translate words")?;
            println!(
                "files: {}, looked up: {}, cached: {}, untranslatable: {}, failed files: {}",
                summary.files,
                summary.looked_up,
                summary.cached,
                summary.untranslatable,
                summary.failed_files
            );
        }
        Command::Translate {
            command: TranslateCommand::Chapters(args),
        } => {
            let summary = commands::translate_chapters(args).context("translate chapters")?;
            println!(
                "files: {}, paragraphs: {}, failed files: {}",
                summary.files, summary.paragraphs, summary.failed_files
            );
        }
        Command::Translate {
            command: TranslateCommand::Merge(args),
        } => {
            let total = commands::merge(args).context("translate merge")?;
            println!("merged words: {total}");
        }
        Command::Translate {
            command: TranslateCommand::Humanize(args),
        } => {
            let path = commands::humanize(args).context("translate humanize")?;
            println!("{}", path.display());
        }
        Command::Translate {
            command: TranslateCommand::Empty(args),
        } => {
            for word in commands::empty(args).context("translate empty")? {
                println!("{word}");
            }
        }
        Command::Account {
            command: AccountCommand::Add(args),
        } => {
            commands::account_add(args).context("account add")?;
        }
    }

    Ok(())
}
