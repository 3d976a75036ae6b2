//! Slash commands: what exists, how their parameters are parsed, and what
//! they answer.

use std::fmt::Write;

use serenity::all::{
    ChannelId, CommandOptionType, CreateCommand, CreateCommandOption, Permissions, UserId,
};

use crate::{
    app::App,
    backfill::{BackfillOutcome, BackfillReport, DEFAULT_SCAN_LIMIT},
    database::TOP_USERS_LIMIT,
    error::{Error, Result},
    platform::ChatPlatform,
    reminder,
};

pub const RANKING_TITLE: &str = "🏆 Bumpランキング 🏆";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamKind {
    User,
    Integer { min: u32, max: u32 },
}

#[derive(Clone, Copy, Debug)]
pub struct CommandParam {
    pub name: &'static str,
    pub description: &'static str,
    pub kind: ParamKind,
    pub required: bool,
}

#[derive(Clone, Copy, Debug)]
pub struct CommandSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub params: &'static [CommandParam],
    /// Only server administrators may use it.
    pub admin_only: bool,
}

pub const BUMP_TOP: CommandSpec = CommandSpec {
    name: "bump_top",
    description: "Bump回数のトップ5ランキングを表示します。",
    params: &[],
    admin_only: false,
};

pub const BUMP_USER: CommandSpec = CommandSpec {
    name: "bump_user",
    description: "指定したユーザーのBump回数を表示します。",
    params: &[CommandParam {
        name: "user",
        description: "回数を調べるユーザー",
        kind: ParamKind::User,
        required: true,
    }],
    admin_only: false,
};

pub const BUMP_TIME: CommandSpec = CommandSpec {
    name: "bump_time",
    description: "次のBumpリマインド時刻を表示します。",
    params: &[],
    admin_only: false,
};

pub const SCAN_HISTORY: CommandSpec = CommandSpec {
    name: "scan_history",
    description: "【管理者用/一度きり】過去のBump履歴をスキャンして登録します。",
    params: &[CommandParam {
        name: "limit",
        description: "スキャンするメッセージ数 (既定: 1000)",
        kind: ParamKind::Integer { min: 1, max: 10000 },
        required: false,
    }],
    admin_only: true,
};

pub const COMMANDS: &[CommandSpec] = &[BUMP_TOP, BUMP_USER, BUMP_TIME, SCAN_HISTORY];

impl CommandSpec {
    pub fn find(name: &str) -> Option<&'static CommandSpec> {
        COMMANDS.iter().find(|command| command.name == name)
    }

    /// Whether the answer should only be visible to whoever asked.
    pub fn ephemeral(&self) -> bool {
        self.admin_only
    }

    fn param(&self, name: &str) -> Option<&'static CommandParam> {
        self.params.iter().find(|param| param.name == name)
    }

    pub fn to_discord(&self) -> CreateCommand {
        let mut command = CreateCommand::new(self.name).description(self.description);
        if self.admin_only {
            command = command.default_member_permissions(Permissions::ADMINISTRATOR);
        }
        for param in self.params {
            let option = match param.kind {
                ParamKind::User => {
                    CreateCommandOption::new(CommandOptionType::User, param.name, param.description)
                }
                ParamKind::Integer { min, max } => CreateCommandOption::new(
                    CommandOptionType::Integer,
                    param.name,
                    param.description,
                )
                .min_int_value(min.into())
                .max_int_value(max.into()),
            };
            command = command.add_option(option.required(param.required));
        }
        command
    }
}

pub fn generate_discord_commands() -> Vec<CreateCommand> {
    COMMANDS.iter().map(CommandSpec::to_discord).collect()
}

/// A parameter value as handed over by the platform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OptionValue {
    User(UserId),
    Integer(i64),
}

/// A parsed, type-checked command call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Invocation {
    BumpTop,
    BumpUser(UserId),
    BumpTime,
    ScanHistory { limit: i64 },
}

impl Invocation {
    /// Check `options` against the command's parameter table and build the call.
    pub fn parse(name: &str, options: &[(&str, OptionValue)]) -> Result<Invocation> {
        let spec = CommandSpec::find(name)
            .ok_or_else(|| Error::Validation(format!("unknown command {name}")))?;

        for (option_name, value) in options {
            let param = spec.param(option_name).ok_or_else(|| {
                Error::Validation(format!("{name} has no parameter {option_name}"))
            })?;
            match (param.kind, value) {
                (ParamKind::User, OptionValue::User(_)) => {}
                (ParamKind::Integer { min, max }, OptionValue::Integer(x)) => {
                    if *x < i64::from(min) || *x > i64::from(max) {
                        return Err(Error::Validation(format!(
                            "{option_name} must be between {min} and {max}"
                        )));
                    }
                }
                _ => {
                    return Err(Error::Validation(format!(
                        "{option_name} has the wrong type"
                    )))
                }
            }
        }

        for param in spec.params.iter().filter(|x| x.required) {
            if !options.iter().any(|(name, _)| *name == param.name) {
                return Err(Error::Validation(format!("{} is required", param.name)));
            }
        }

        let get = |wanted: &str| {
            options
                .iter()
                .find(|(name, _)| *name == wanted)
                .map(|(_, value)| *value)
        };

        match (spec.name, get("user"), get("limit")) {
            ("bump_top", ..) => Ok(Invocation::BumpTop),
            ("bump_user", Some(OptionValue::User(user)), _) => Ok(Invocation::BumpUser(user)),
            ("bump_time", ..) => Ok(Invocation::BumpTime),
            ("scan_history", _, Some(OptionValue::Integer(limit))) => {
                Ok(Invocation::ScanHistory { limit })
            }
            ("scan_history", _, None) => Ok(Invocation::ScanHistory {
                limit: DEFAULT_SCAN_LIMIT,
            }),
            _ => Err(Error::Validation(format!("can't make sense of /{name}"))),
        }
    }

    pub fn spec(&self) -> &'static CommandSpec {
        match self {
            Invocation::BumpTop => &BUMP_TOP,
            Invocation::BumpUser(_) => &BUMP_USER,
            Invocation::BumpTime => &BUMP_TIME,
            Invocation::ScanHistory { .. } => &SCAN_HISTORY,
        }
    }
}

/// Who called a command, and from where.
#[derive(Clone, Copy, Debug)]
pub struct Caller<'a> {
    pub name: &'a str,
    pub channel: ChannelId,
    pub is_admin: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    /// Body of the ranking embed, titled [`RANKING_TITLE`].
    Ranking(String),
}

/// Display name, or a placeholder if the user can't be looked up.
async fn user_name(platform: &impl ChatPlatform, user: UserId) -> String {
    match platform.fetch_user_name(user).await {
        Ok(name) => name,
        Err(e) => {
            log::warn!("Could not look up user {user}: {e}");
            format!("不明なユーザー(ID:{user})")
        }
    }
}

async fn bump_top(app: &App, platform: &impl ChatPlatform) -> Result<Reply> {
    let top = app.database.get_top_users(TOP_USERS_LIMIT).await?;
    if top.is_empty() {
        return Ok(Reply::Text(
            "まだ誰もBumpしていません。まずは`/bump`してみよう！".to_string(),
        ));
    }

    let mut text = String::new();
    for (i, entry) in top.iter().enumerate() {
        let name = user_name(platform, entry.user_id).await;
        writeln!(text, "**{}位**: {} - **{}** 回", i + 1, name, entry.count)
            .expect("Writing to a String can't fail");
    }
    Ok(Reply::Ranking(text))
}

async fn bump_user(app: &App, platform: &impl ChatPlatform, user: UserId) -> Result<Reply> {
    let count = app.database.get_user_count(user).await?;
    let name = user_name(platform, user).await;
    Ok(Reply::Text(format!(
        "{name}さんの累計Bump回数は **{count}回** です。"
    )))
}

async fn bump_time(app: &App) -> Result<Reply> {
    Ok(Reply::Text(match reminder::current(&app.database).await? {
        Some(slot) => format!(
            "次のBumpが可能になるのは <t:{}:R> です。",
            slot.remind_at.timestamp()
        ),
        None => "現在、リマインドは設定されていません。`/bump` をお願いします！".to_string(),
    }))
}

async fn render_report(platform: &impl ChatPlatform, report: &BackfillReport) -> String {
    let mut lines = Vec::with_capacity(report.per_user.len());
    for entry in &report.per_user {
        let name = user_name(platform, entry.user_id).await;
        lines.push(format!("・{}: {}回", name, entry.count));
    }
    format!(
        "過去ログのスキャンが完了しました！\n\
        **{}件**のBumpを検出し、データベースに登録しました。\n\n\
        【検出結果】\n\
        {}\n\n\
        **安全装置が作動しました。今後このコマンドは実行できません。**",
        report.total,
        lines.join("\n")
    )
}

async fn scan_history(
    app: &App,
    platform: &impl ChatPlatform,
    caller: Caller<'_>,
    limit: i64,
) -> Result<Reply> {
    log::info!(
        "User {} started history scan for {limit} messages.",
        caller.name
    );
    let outcome = app
        .history_scan
        .run(&app.database, platform, caller.channel, limit)
        .await?;

    Ok(Reply::Text(match outcome {
        BackfillOutcome::AlreadyCompleted => {
            log::warn!(
                "User {} tried to run scan_history again, but it's already completed.",
                caller.name
            );
            concat!(
                "**エラー：過去ログのスキャンは既に完了しています！**\n",
                "このコマンドは、安全のため一度しか実行できません。\n",
                "もし、どうしても再スキャンが必要な場合は、Botの開発者に相談してください。"
            )
            .to_string()
        }
        BackfillOutcome::NothingFound { scanned } => format!(
            "{scanned}件のメッセージをスキャンしましたが、Bump履歴は見つかりませんでした。"
        ),
        BackfillOutcome::Completed(report) => render_report(platform, &report).await,
    }))
}

/// What to say when `invocation` failed with `error`.
fn apology(invocation: &Invocation, error: &Error) -> String {
    if let Error::Validation(reason) = error {
        return format!("入力が正しくありません: {reason}");
    }
    match invocation {
        Invocation::BumpTop => "ごめん！ランキングの表示中にエラーが起きました。".to_string(),
        Invocation::BumpUser(_) => "ごめん！回数の表示中にエラーが起きました。".to_string(),
        Invocation::BumpTime => {
            "ごめん！リマインド時刻の表示中にエラーが起きました。".to_string()
        }
        Invocation::ScanHistory { .. } => {
            format!("スキャン中にエラーが発生しました。\n`{error}`")
        }
    }
}

/// Run the command `name` with `options` and produce the answer.
/// Failures are logged and turned into a friendly message here.
pub async fn respond(
    app: &App,
    platform: &impl ChatPlatform,
    name: &str,
    options: &[(&str, OptionValue)],
    caller: Caller<'_>,
) -> Reply {
    let invocation = match Invocation::parse(name, options) {
        Ok(x) => x,
        Err(e) => {
            log::info!("Rejected /{name} from {}: {e}", caller.name);
            return Reply::Text(format!("入力が正しくありません: {e}"));
        }
    };

    if invocation.spec().admin_only && !caller.is_admin {
        return Reply::Text("このコマンドはサーバーの管理者しか使えません。".to_string());
    }

    let result = match invocation {
        Invocation::BumpTop => bump_top(app, platform).await,
        Invocation::BumpUser(user) => bump_user(app, platform, user).await,
        Invocation::BumpTime => bump_time(app).await,
        Invocation::ScanHistory { limit } => scan_history(app, platform, caller, limit).await,
    };

    result.unwrap_or_else(|e| {
        log::error!("Error in /{name}: {e}");
        Reply::Text(apology(&invocation, &e))
    })
}
