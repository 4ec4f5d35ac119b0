//! 文本指令解析
//!
//! 支持前缀 `/`、`!`、`.`；以 @提及开头时前缀可省略（`@bot play`）。
//! Telegram 群聊中的 `/move@my_bot e2e4` 会去掉 `@my_bot` 后缀。
//! 指令名不区分大小写，参数原样传递。

use std::sync::OnceLock;

use regex::Regex;

const PREFIXES: [char; 3] = ['/', '!', '.'];

/// 解析后的指令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    /// 弹出模式选择按钮
    Play,
    /// `mode <solo|ai>`；无参数时同 Play
    Mode(Option<String>),
    /// 以当前模式重开
    Start,
    /// `difficulty <tier|random>`；无参数时弹出难度按钮
    Difficulty(Option<String>),
    /// `move <uci>`
    Move(Option<String>),
    Ai,
    Hint,
    Board,
    Exit,
    Guide,
}

impl BotCommand {
    fn from_parts(name: &str, arg: Option<String>) -> Option<Self> {
        let command = match name {
            "play" => BotCommand::Play,
            "mode" => BotCommand::Mode(arg),
            "start" => BotCommand::Start,
            "difficulty" | "level" => BotCommand::Difficulty(arg),
            "move" | "mv" => BotCommand::Move(arg),
            "ai" | "a" => BotCommand::Ai,
            "hint" | "h" => BotCommand::Hint,
            "board" | "b" => BotCommand::Board,
            "exit" | "quit" | "q" => BotCommand::Exit,
            "guide" | "help" => BotCommand::Guide,
            _ => return None,
        };
        Some(command)
    }
}

static MENTION_RE: OnceLock<Option<Regex>> = OnceLock::new();

/// 去掉开头的 @提及（`@name` 或 `<@123>`），返回剩余文本与是否带提及
fn strip_leading_mention(s: &str) -> (&str, bool) {
    let re = MENTION_RE.get_or_init(|| Regex::new(r"^\s*(?:<@!?\d+>|@[A-Za-z0-9_]+)\s*").ok());
    match re.as_ref().and_then(|re| re.find(s)) {
        Some(m) => (&s[m.end()..], true),
        None => (s, false),
    }
}

/// 解析一条聊天消息；不是指令（或不认识的指令）返回 None
pub fn parse_command(text: &str) -> Option<BotCommand> {
    let (rest, mentioned) = strip_leading_mention(text);
    let rest = rest.trim();

    let body = match rest.strip_prefix(PREFIXES) {
        Some(body) => body,
        None if mentioned => rest,
        None => return None,
    };

    let mut parts = body.split_whitespace();
    let head = parts.next()?;
    let name = head.split('@').next().unwrap_or(head).to_lowercase();
    let arg = parts.next().map(str::to_string);
    BotCommand::from_parts(&name, arg)
}
