//! Recognizing DISBOARD's "bump succeeded" messages.

use std::sync::LazyLock;

use regex::Regex;
use serenity::model::id::UserId;

use crate::platform::InboundMessage;

/// DISBOARD's own account.
pub const DISBOARD_BOT_ID: UserId = UserId::new(302050872383242240);

/// Text DISBOARD puts into the embed on a successful bump.
pub const BUMP_SUCCESS_PHRASE: &str = "表示順をアップしたよ";

static MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<@!?(\d+)>").expect("Regex will always be valid"));

/// If this message is DISBOARD announcing a successful bump, returns who bumped.
///
/// Used as-is both for live messages and for the history scan.
pub fn extract_bumper(message: &InboundMessage) -> Option<UserId> {
    if message.author_id != DISBOARD_BOT_ID {
        return None;
    }

    let description = message.embed_description.as_deref()?;

    if !description.contains(BUMP_SUCCESS_PHRASE) {
        return None;
    }

    let id: u64 = MENTION.captures(description)?.get(1)?.as_str().parse().ok()?;

    // Snowflakes are never zero, and UserId refuses to hold one.
    (id != 0).then(|| UserId::new(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::bump_message;

    fn from_disboard(description: Option<&str>) -> InboundMessage {
        InboundMessage {
            author_id: DISBOARD_BOT_ID,
            embed_description: description.map(str::to_string),
        }
    }

    #[test]
    fn well_formed_bump() {
        assert_eq!(extract_bumper(&bump_message(123)), Some(UserId::new(123)));
        assert_eq!(
            extract_bumper(&from_disboard(Some("<@!123> さんが表示順をアップしたよ"))),
            Some(UserId::new(123))
        );
    }

    #[test]
    fn first_mention_wins() {
        let message = from_disboard(Some("<@5> さんが表示順をアップしたよ <@6>"));
        assert_eq!(extract_bumper(&message), Some(UserId::new(5)));
    }

    #[test]
    fn other_authors_never_match() {
        let mut message = bump_message(123);
        message.author_id = UserId::new(1366743555);
        assert_eq!(extract_bumper(&message), None);
    }

    #[test]
    fn phrase_without_mention() {
        assert_eq!(extract_bumper(&from_disboard(Some("表示順をアップしたよ"))), None);
        assert_eq!(
            extract_bumper(&from_disboard(Some("@someone さんが表示順をアップしたよ"))),
            None
        );
    }

    #[test]
    fn mention_without_phrase() {
        assert_eq!(
            extract_bumper(&from_disboard(Some("<@123> まだBumpできません"))),
            None
        );
    }

    #[test]
    fn no_embed() {
        assert_eq!(extract_bumper(&from_disboard(None)), None);
    }

    #[test]
    fn unrepresentable_ids() {
        assert_eq!(
            extract_bumper(&from_disboard(Some("<@0> さんが表示順をアップしたよ"))),
            None
        );
        assert_eq!(
            extract_bumper(&from_disboard(Some(
                "<@99999999999999999999999> さんが表示順をアップしたよ"
            ))),
            None
        );
    }
}
