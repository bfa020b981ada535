use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use shared::domain::{HistoryId, HistoryRecord};
use storage::{Storage, BRIGHTNESS_KEY, PLAYBACK_SPEED_KEY};

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/player.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    ListHistory {
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    DeleteHistory {
        id: i64,
    },
    ClearHistory,
    SetThumbnail {
        id: i64,
        path: Option<String>,
    },
    ShowPreferences,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;

    match cli.command {
        Command::ListHistory { limit } => {
            for record in storage.recent_history(limit).await? {
                println!("{}", describe(&record));
            }
        }
        Command::DeleteHistory { id } => {
            if !storage.delete_history(HistoryId(id)).await? {
                bail!("no history record with id={id}");
            }
            println!("deleted history id={id}");
        }
        Command::ClearHistory => {
            let removed = storage.delete_all_history().await?;
            println!("deleted {removed} history records");
        }
        Command::SetThumbnail { id, path } => {
            if !storage
                .set_thumbnail_path(HistoryId(id), path.as_deref())
                .await?
            {
                bail!("no history record with id={id}");
            }
            println!("updated thumbnail for history id={id}");
        }
        Command::ShowPreferences => {
            for key in [PLAYBACK_SPEED_KEY, BRIGHTNESS_KEY] {
                let value = storage.load_preference(key).await?;
                println!("{key}={}", value.as_deref().unwrap_or("<unset>"));
            }
        }
    }

    Ok(())
}

fn describe(record: &HistoryRecord) -> String {
    let played_at = DateTime::<Utc>::from_timestamp_millis(record.last_played_at_ms)
        .map(|at| at.to_rfc3339())
        .unwrap_or_else(|| record.last_played_at_ms.to_string());
    format!(
        "{id}\t{title}\t{position}/{duration} ms\t{played_at}\t{source}",
        id = record.id.0,
        title = record.title,
        position = record.last_position_ms,
        duration = record.duration_ms,
        source = record.video_source.encode(),
    )
}
