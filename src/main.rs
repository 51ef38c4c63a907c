mod categories;
mod cli;
mod commit;
mod db;
mod error;
mod fmt;
mod merge;
mod models;
mod recognizer;
mod reports;
mod session;
mod settings;
mod split;
mod staging;
mod storage;
mod store;

use clap::{CommandFactory, Parser};

use cli::entry::EntryArgs;
use cli::transactions::ListArgs;
use cli::{CategoryCommands, Cli, Commands, ReportCommands, StageCommands};

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Status => cli::status::run(),
        Commands::Add {
            amount,
            kind,
            category,
            note,
            date,
            offset,
        } => cli::entry::add(
            EntryArgs {
                amount,
                kind,
                category,
                note,
                date,
            },
            offset,
        ),
        Commands::List {
            kind,
            category,
            from_date,
            to_date,
            search,
        } => cli::transactions::list(ListArgs {
            kind,
            category,
            from_date,
            to_date,
            search,
        }),
        Commands::Edit { id, fields } => cli::transactions::edit(&id, fields),
        Commands::Delete { id } => cli::transactions::delete(&id),
        Commands::Stage { command } => match command {
            StageCommands::Add {
                amount,
                kind,
                category,
                note,
                date,
            } => cli::stage::add(EntryArgs {
                amount,
                kind,
                category,
                note,
                date,
            }),
            StageCommands::Parse { text, file } => cli::stage::parse(text, file.as_deref()),
            StageCommands::List => cli::stage::list(),
            StageCommands::Edit { id, fields } => cli::stage::edit(id, fields),
            StageCommands::Remove { id } => cli::stage::remove(id),
            StageCommands::Merge {
                source,
                into,
                same_kind,
            } => cli::stage::merge(source, into, same_kind),
            StageCommands::Link { source, target } => cli::stage::link(source, target),
            StageCommands::Unlink { id } => cli::stage::unlink(id),
            StageCommands::Split { id } => cli::stage::split(id),
            StageCommands::Commit => cli::stage::commit(),
            StageCommands::Clear => cli::stage::clear(),
        },
        Commands::Categories { command } => match command {
            CategoryCommands::List { kind } => cli::categories::list(kind),
            CategoryCommands::Add {
                name,
                kind,
                icon,
                color,
            } => cli::categories::add(&name, kind, icon.as_deref(), color.as_deref()),
            CategoryCommands::Rename { id, name } => cli::categories::rename(&id, &name),
            CategoryCommands::Remove { id } => cli::categories::remove(&id),
        },
        Commands::Report { command } => match command {
            ReportCommands::Summary {
                month,
                from_date,
                to_date,
            } => cli::report::summary(month, from_date, to_date),
            ReportCommands::Monthly { year } => cli::report::monthly(year),
            ReportCommands::Daily { month } => cli::report::daily(&month),
        },
        Commands::Export { output } => cli::export::run(output),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "pocketbook", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
