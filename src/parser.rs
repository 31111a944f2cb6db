use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case},
    character::complete::{char, multispace0},
    combinator::{all_consuming, map, opt},
    sequence::{preceded, terminated, tuple},
    Finish, IResult,
};

#[derive(Debug, PartialEq)]
pub enum BotCmd<'input> {
    /// A sidekick room link was found somewhere in the text.
    ToggleRoom(&'input str),
    Help,
    List,
    Other(&'input str),
}

/// A room link is `https?://sidekick.fans/<alphanumeric id>`. Query string,
/// fragment or trailing slash after the id are not part of it.
fn room_link(input: &str) -> IResult<&str, &str> {
    preceded(
        tuple((tag("http"), opt(char('s')), tag("://sidekick.fans/"))),
        nom::bytes::complete::take_while1(|c: char| c.is_ascii_alphanumeric()),
    )(input)
}

/// First room link match anywhere in the text, surrounding prose ignored.
pub fn extract_room_id(text: &str) -> Option<&str> {
    let mut rest = text;
    while !rest.is_empty() {
        if let Ok((_, room_id)) = room_link(rest) {
            return Some(room_id);
        }
        let mut chars = rest.chars();
        chars.next();
        rest = chars.as_str();
    }
    None
}

fn help(input: &str) -> IResult<&str, BotCmd> {
    map(alt((tag_no_case("/start"), tag_no_case("/help"))), |_| {
        BotCmd::Help
    })(input)
}

fn list(input: &str) -> IResult<&str, BotCmd> {
    map(tag_no_case("/list"), |_| BotCmd::List)(input)
}

/// A link anywhere in the text wins over commands, everything that is
/// neither is `Other` and gets the unknown-command reply.
pub fn parse_message(text: &str) -> BotCmd<'_> {
    if let Some(room_id) = extract_room_id(text) {
        return BotCmd::ToggleRoom(room_id);
    }
    all_consuming(terminated(alt((help, list)), multispace0))(text.trim())
        .finish()
        .map(|(_, cmd)| cmd)
        .unwrap_or(BotCmd::Other(text))
}
