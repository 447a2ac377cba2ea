//! Inbound update routing: commands go to the settings service, videos and
//! documents start an encode job.

use super::{TelegramChat, TelegramTransfer};
use crate::adapters::ffmpeg::FfmpegEncoder;
use crate::application::pipeline::EncodeJobService;
use crate::application::settings::SettingsService;
use crate::domain::jobs::{MediaRequest, RemoteFile, UserRecord};
use crate::ports::repository::UserRepository;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::{debug, info};

pub type JobService =
    EncodeJobService<TelegramChat, TelegramTransfer, FfmpegEncoder, dyn UserRepository>;
pub type Settings = SettingsService<dyn UserRepository>;

#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "register and show the welcome message")]
    Start,
    #[command(description = "explain how the bot works")]
    Help,
    #[command(description = "show your encoding settings")]
    Settings,
    #[command(description = "change one setting: /set <field> <value>")]
    Set(String),
    #[command(description = "restore the default settings")]
    Reset,
    #[command(description = "delete your account and settings")]
    Delete,
}

/// Build a job request from a video or document message.
pub fn media_request(msg: &Message) -> Option<MediaRequest> {
    let user_id = msg.from.as_ref().map(|user| user.id.0 as i64)?;
    let file = if let Some(video) = msg.video() {
        RemoteFile {
            file_id: video.file.id.to_string(),
            file_name: video.file_name.clone(),
            size: u64::from(video.file.size),
        }
    } else if let Some(document) = msg.document() {
        RemoteFile {
            file_id: document.file.id.to_string(),
            file_name: document.file_name.clone(),
            size: u64::from(document.file.size),
        }
    } else {
        return None;
    };
    Some(MediaRequest {
        chat_id: msg.chat.id.0,
        message_id: msg.id.0,
        user_id,
        file,
    })
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    settings: Arc<Settings>,
) -> ResponseResult<()> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let user_id = user.id.0 as i64;
    debug!(user_id, command = ?cmd, "command received");

    let reply = match cmd {
        Command::Start => {
            let record = UserRecord::new(user_id, user.username.clone(), user.first_name.clone());
            settings.register(&record).await
        }
        Command::Help => settings.help_text(),
        Command::Settings => settings.describe(user_id).await,
        Command::Set(args) => settings.apply_command(user_id, &args).await,
        Command::Reset => settings.reset(user_id).await,
        Command::Delete => settings.forget(user_id).await,
    };
    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

async fn handle_media(request: MediaRequest, jobs: Arc<JobService>) -> ResponseResult<()> {
    info!(
        job = %request.job_key(),
        user_id = request.user_id,
        size = request.file.size,
        "media received"
    );
    // Jobs run detached so the chat keeps answering commands while encoding.
    tokio::spawn(async move {
        jobs.handle_media(request).await;
    });
    Ok(())
}

/// Poll for updates until ctrl-c.
pub async fn run(bot: Bot, jobs: Arc<JobService>, settings: Arc<Settings>) {
    let handler = Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(dptree::filter_map(|msg: Message| media_request(&msg)).endpoint(handle_media));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![jobs, settings])
        .default_handler(|upd| async move {
            debug!(update_id = ?upd.id, "unhandled update");
        })
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_parsing() {
        assert!(matches!(Command::parse("/start", "encodebot"), Ok(Command::Start)));
        match Command::parse("/set crf 28", "encodebot") {
            Ok(Command::Set(args)) => assert_eq!(args, "crf 28"),
            other => panic!("unexpected parse: {other:?}"),
        }
        assert!(matches!(Command::parse("/reset", "encodebot"), Ok(Command::Reset)));
        assert!(Command::parse("/encode", "encodebot").is_err());
    }

    #[test]
    fn test_descriptions_list_every_command() {
        let text = Command::descriptions().to_string();
        for name in ["/start", "/help", "/settings", "/set", "/reset", "/delete"] {
            assert!(text.contains(name), "missing {name}");
        }
    }
}
